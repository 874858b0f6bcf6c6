// Core algorithm exports
pub mod eligibility;
pub mod matcher;
pub mod prompts;
pub mod reasoning;
pub mod retrieval;
pub mod scoring;
pub mod similarity;

pub use eligibility::{additional_years_needed, filter_eligible, is_eligible};
pub use matcher::{CareerMatcher, CostBreakdown, MatcherConfig, MatcherServices, PricingRates};
pub use prompts::{system_instruction, ReasoningRubric};
pub use reasoning::{
    build_payload, locate_json_array, normalize_skills_gap, parse_matches, ReasoningOutcome,
    ReasoningStage,
};
pub use retrieval::{
    build_queries, CandidateSource, LocalSnapshotSource, ProfileQueries, RetrievalOutcome,
    RetrievalStage, SourceRequest, VectorStoreSource,
};
pub use scoring::{education_fit, education_rank_for_label, salary_fit, skill_overlap, StructuredScorer};
pub use similarity::{cosine_similarity, weighted_similarity};
