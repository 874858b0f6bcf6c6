use serde::{Deserialize, Serialize};
use validator::Validate;
use crate::models::domain::{MatchOptions, UserPreferences, UserProfile};

/// Request to match careers for a single submission
///
/// `profile` is present only when a resume was parsed; questionnaire-only
/// submissions omit it.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MatchCareersRequest {
    #[validate(nested)]
    #[serde(default)]
    pub profile: Option<UserProfile>,
    #[validate(nested)]
    pub preferences: UserPreferences,
    #[serde(default)]
    pub options: MatchOptions,
}
