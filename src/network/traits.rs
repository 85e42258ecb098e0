//! Request/response types and the dispatch seam

use super::TransportError;
use async_trait::async_trait;
use std::borrow::Cow;

/// A file sent as one multipart form field
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Request body types
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(serde_json::Value),
    Multipart(FilePart),
}

/// POST request against the search service, addressed by endpoint name
///
/// Every service endpoint is a POST. Requests are cloneable and replayable so
/// the transport can retry them.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Endpoint path relative to the service base URL
    pub endpoint: String,
    /// Request body
    pub body: Option<RequestBody>,
}

impl ApiRequest {
    /// Create a POST request
    pub fn post(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            body: None,
        }
    }

    /// Add JSON body
    pub fn json(mut self, data: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(data));
        self
    }

    /// Add a multipart file body
    pub fn multipart(mut self, part: FilePart) -> Self {
        self.body = Some(RequestBody::Multipart(part));
        self
    }
}

/// HTTP response, returned whatever its status
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Content-Type header, if any
    pub content_type: Option<String>,
    /// Raw response body
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: None,
            body: body.into(),
        }
    }

    /// Parse response as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// Body as text, lossy
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Check if response is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if response indicates rate limiting
    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

/// Issues a single request attempt
///
/// Implementations report timeouts as [`TransportError::Timeout`] and every other
/// failure to obtain a response as [`TransportError::Network`]. A 429 is a response,
/// not an error.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}
