use actix_web::{http::StatusCode, web, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

use crate::core::CareerMatcher;
use crate::error::MatchError;
use crate::models::{ErrorResponse, HealthResponse, MatchCareersRequest, MatchCareersResponse};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub matcher: Arc<CareerMatcher>,
}

/// Configure all career-matching routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/careers/match", web::post().to(match_careers));
}

/// Health check endpoint
///
/// Loads the catalog on first call; a catalog that cannot be read reports
/// `degraded`.
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let catalog_loaded = match state.matcher.catalog().catalog().await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!("Health check could not load catalog: {}", e);
            false
        }
    };

    let status = if catalog_loaded { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        catalog_loaded,
    })
}

/// Match careers endpoint
///
/// POST /api/v1/careers/match
///
/// Request body:
/// ```json
/// {
///   "profile": { "skills": [], "jobTitles": [], "education": {"level": "bachelors"} },
///   "preferences": {
///     "trainingWillingness": "short-term",
///     "educationLevel": "bachelors",
///     "workBackground": ["technology"],
///     "salaryTarget": "60-80k",
///     "workStyle": ["analytical"]
///   },
///   "options": { "useVectorStore": true }
/// }
/// ```
async fn match_careers(state: web::Data<AppState>, req: web::Json<MatchCareersRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for match request: field_errors={:?}", errors);
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let request_id = uuid::Uuid::new_v4().to_string();
    let req = req.into_inner();

    tracing::info!(
        "Matching careers: request_id={}, resume_profile={}, willingness={:?}",
        request_id,
        req.profile.is_some(),
        req.preferences.training_willingness
    );

    match state
        .matcher
        .match_careers(req.profile.as_ref(), &req.preferences, &req.options)
        .await
    {
        Ok(result) => HttpResponse::Ok().json(MatchCareersResponse {
            request_id,
            generated_at: chrono::Utc::now(),
            matches: result.matches,
            metadata: result.metadata,
        }),
        Err(e) => {
            tracing::error!("Matching failed: request_id={}, error={}", request_id, e);
            if let MatchError::Parse { raw, .. } = &e {
                tracing::debug!("Unparseable reasoning response for {}: {}", request_id, raw);
            }
            error_response(&e)
        }
    }
}

/// HTTP status for an engine error
pub fn status_for(err: &MatchError) -> StatusCode {
    match err {
        MatchError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        MatchError::Parse { .. } | MatchError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        MatchError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        MatchError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        MatchError::NoCandidateSource(_) => StatusCode::SERVICE_UNAVAILABLE,
        MatchError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// JSON error body for an engine error; never includes raw model output
pub fn error_response(err: &MatchError) -> HttpResponse {
    let status = status_for(err);
    let mut builder = HttpResponse::build(status);

    if let MatchError::RateLimited {
        retry_after: Some(delay),
        ..
    } = err
    {
        builder.insert_header(("Retry-After", delay.as_secs().max(1).to_string()));
    }

    builder.json(ErrorResponse {
        error: err.code().to_string(),
        message: err.to_string(),
        status_code: status.as_u16(),
    })
}
