//! HTTP networking module
//!
//! Provides the client used to reach the face-search service and the paced,
//! retrying transport every service call goes through.

mod client;
mod paced;
mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use client::HttpClient;
pub use paced::{PacedTransport, RetryPolicy};
pub use traits::*;

use thiserror::Error;

/// Failure to obtain a usable response from the service
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Every attempt was answered with HTTP 429
    #[error("rate limited by the search service")]
    RateLimited,

    /// Every attempt timed out
    #[error("request to the search service timed out")]
    Timeout,

    /// Connection or protocol failure, not retried
    #[error("network error: {detail}")]
    Network { detail: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Network {
                detail: e.to_string(),
            }
        }
    }
}
