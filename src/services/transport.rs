use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

use crate::error::{MatchError, Result};

/// Receiving side of a caller-triggered cancellation
///
/// Cloned into every network call of a request. Dropping the paired
/// [`CancelHandle`] without cancelling leaves the token pending forever.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

/// Sending side of a cancellation, held by the caller
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl CancelToken {
    pub fn pair() -> (CancelHandle, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelToken { rx })
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the handle has cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Run a network future under a timeout and optional cancellation
///
/// Both an elapsed budget and a cancellation become [`MatchError::Timeout`].
pub async fn bounded<T, F>(
    service: &'static str,
    budget: Duration,
    cancel: Option<&CancelToken>,
    call: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let timed = tokio::time::timeout(budget, call);

    let outcome = match cancel {
        Some(token) => {
            tokio::select! {
                res = timed => res,
                _ = token.cancelled() => {
                    tracing::warn!("{} call cancelled by caller", service);
                    return Err(MatchError::Timeout { service });
                }
            }
        }
        None => timed.await,
    };

    match outcome {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("{} call exceeded {}ms budget", service, budget.as_millis());
            Err(MatchError::Timeout { service })
        }
    }
}

/// Convert a non-success response into the matching error
///
/// 429 becomes [`MatchError::RateLimited`] with the `Retry-After` hint (in
/// seconds) when the service sent one. No retry is attempted here.
pub async fn check_status(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status.as_u16() == 429 {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        tracing::warn!("{} returned 429 (retry after {:?})", service, retry_after);
        return Err(MatchError::RateLimited { service, retry_after });
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read body".to_string());
    tracing::error!("{} returned {}: {}", service, status, body);
    Err(MatchError::Upstream {
        service,
        message: format!("status {}", status),
    })
}

/// Map a transport-level failure, keeping reqwest's own timeouts typed
pub fn transport_error(service: &'static str, err: reqwest::Error) -> MatchError {
    if err.is_timeout() {
        MatchError::Timeout { service }
    } else {
        MatchError::Upstream {
            service,
            message: err.to_string(),
        }
    }
}

/// Rough token count when a service does not report usage
pub fn estimate_tokens(text: &str) -> u32 {
    (text.chars().count() as u32).div_ceil(4)
}

pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .build()
        .map_err(|e| MatchError::Configuration(format!("Failed to create HTTP client: {}", e)))
}
