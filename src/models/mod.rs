// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    CareerCandidate, CareerMatch, CatalogEntry, CurrentEducation, Education, EducationLevel,
    FunnelLimits, MatchOptions, MatchingMetadata, MatchingResult, ModelTier, QueryWeights,
    ResilienceAdjustments, ResilienceClass, RetrievalSource, SalaryBracket, ScoringWeights,
    StageTimings, TimelineBucket, TrainingWillingness, UserPreferences, UserProfile,
    WorkBackground, WorkStyle,
};
pub use requests::MatchCareersRequest;
pub use responses::{ErrorResponse, HealthResponse, MatchCareersResponse};
