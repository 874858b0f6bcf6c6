use serde::{Deserialize, Serialize};
use crate::models::domain::{CareerMatch, MatchingMetadata};

/// Response for the match careers endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCareersResponse {
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(rename = "generatedAt")]
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub matches: Vec<CareerMatch>,
    pub metadata: MatchingMetadata,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "catalogLoaded")]
    pub catalog_loaded: bool,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}
