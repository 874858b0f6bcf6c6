use std::time::Duration;
use thiserror::Error;

/// Errors that abort a matching run
///
/// Degradations such as a vector store outage or a missing enrichment table
/// are logged by the stage that hits them and never surface here.
#[derive(Debug, Error)]
pub enum MatchError {
    /// Missing credentials or settings for a required external service
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Catalog or snapshot unreadable, or a record failed schema checks
    #[error("Validation error: {0}")]
    Validation(String),

    /// The reasoning response did not contain exactly one valid JSON array.
    /// `raw` keeps the full response for diagnostics; it is never sent to users.
    #[error("Failed to parse reasoning response: {message}")]
    Parse { message: String, raw: String },

    #[error("{service} is rate limiting requests")]
    RateLimited {
        service: &'static str,
        retry_after: Option<Duration>,
    },

    #[error("{service} did not respond in time, try again shortly")]
    Timeout { service: &'static str },

    #[error("{service} request failed: {message}")]
    Upstream {
        service: &'static str,
        message: String,
    },

    #[error("No candidate source available: {0}")]
    NoCandidateSource(String),
}

impl MatchError {
    pub fn parse(message: impl Into<String>, raw: &str) -> Self {
        MatchError::Parse {
            message: message.into(),
            raw: raw.to_string(),
        }
    }

    /// Stable machine-readable code used in HTTP error bodies
    pub fn code(&self) -> &'static str {
        match self {
            MatchError::Configuration(_) => "configuration_error",
            MatchError::Validation(_) => "validation_error",
            MatchError::Parse { .. } => "parse_error",
            MatchError::RateLimited { .. } => "rate_limited",
            MatchError::Timeout { .. } => "timeout",
            MatchError::Upstream { .. } => "upstream_error",
            MatchError::NoCandidateSource(_) => "no_candidate_source",
        }
    }
}

pub type Result<T> = std::result::Result<T, MatchError>;
