//! Career Match - multi-stage career recommendation engine
//!
//! This library narrows a fixed occupation catalog down to a short, narrated
//! list of careers for one user through a four-stage funnel: eligibility
//! filtering, embedding retrieval, structured re-ranking and generative
//! reasoning.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{CareerMatcher, MatcherConfig, MatcherServices};
pub use error::{MatchError, Result};
pub use models::{
    CareerMatch, MatchCareersRequest, MatchCareersResponse, MatchOptions, MatchingResult,
    UserPreferences, UserProfile,
};
