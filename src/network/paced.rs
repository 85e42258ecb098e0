//! Request pacing and retry/backoff for the search service
//!
//! The service enforces a strict, opaque quota. Every attempt, retries included,
//! starts at least `min_interval` after the previous one; 429s and timeouts are
//! retried with a linear backoff up to a fixed number of attempts.

use super::traits::{ApiRequest, ApiResponse, Dispatch};
use super::TransportError;
use crate::config::PacingSettings;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

/// Pacing and retry parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Minimum spacing between attempt starts
    pub min_interval: Duration,
    /// Total attempts per request
    pub max_attempts: u32,
    /// Backoff unit after a 429
    pub rate_limit_backoff: Duration,
    /// Backoff unit after a timeout
    pub timeout_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&PacingSettings::default())
    }
}

impl From<&PacingSettings> for RetryPolicy {
    fn from(settings: &PacingSettings) -> Self {
        Self {
            min_interval: Duration::from_secs_f64(settings.min_request_interval),
            max_attempts: settings.max_retries.max(1),
            rate_limit_backoff: Duration::from_secs_f64(settings.rate_limit_backoff),
            timeout_backoff: Duration::from_secs_f64(settings.timeout_backoff),
        }
    }
}

/// Transport that spaces out and retries requests on behalf of one logical client
pub struct PacedTransport {
    dispatcher: Arc<dyn Dispatch>,
    policy: RetryPolicy,
    /// Start time of the most recent attempt
    last_request: Mutex<Option<Instant>>,
}

impl PacedTransport {
    pub fn new(dispatcher: Arc<dyn Dispatch>, policy: RetryPolicy) -> Self {
        Self {
            dispatcher,
            policy,
            last_request: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send a request, absorbing 429s and timeouts
    ///
    /// Any response other than 429 is returned as-is; interpreting it is the caller's job.
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let max_attempts = self.policy.max_attempts;
        let mut exhausted = TransportError::RateLimited;

        for attempt in 1..=max_attempts {
            self.pace().await;

            match self.dispatcher.dispatch(request).await {
                Ok(response) if response.is_rate_limited() => {
                    let wait = self.policy.rate_limit_backoff * attempt;
                    warn!(
                        "Rate limited (429) on {} attempt {}/{}. Waiting {:?}...",
                        request.endpoint, attempt, max_attempts, wait
                    );
                    sleep(wait).await;
                    exhausted = TransportError::RateLimited;
                }
                Ok(response) => {
                    debug!("{} answered with HTTP {}", request.endpoint, response.status);
                    return Ok(response);
                }
                Err(TransportError::Timeout) => {
                    error!(
                        "Timeout on {} attempt {}/{}",
                        request.endpoint, attempt, max_attempts
                    );
                    if attempt < max_attempts {
                        sleep(self.policy.timeout_backoff * attempt).await;
                    }
                    exhausted = TransportError::Timeout;
                }
                Err(e) => {
                    error!("Request to {} failed: {}", request.endpoint, e);
                    return Err(e);
                }
            }
        }

        error!(
            "Giving up on {} after {} attempts: {}",
            request.endpoint, max_attempts, exhausted
        );
        Err(exhausted)
    }

    /// Wait until `min_interval` has passed since the last attempt started, then claim the slot
    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.policy.min_interval {
                let wait = self.policy.min_interval - elapsed;
                info!("Rate limit: waiting {:.1}s", wait.as_secs_f64());
                sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}
