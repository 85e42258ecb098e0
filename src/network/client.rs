//! HTTP client for making requests to the search service

use super::traits::{ApiRequest, ApiResponse, Dispatch, RequestBody};
use super::TransportError;
use crate::config::ServiceSettings;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use std::time::Duration;
use url::Url;

/// Timeout for fetching match images from third-party hosts
const IMAGE_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client wrapper bound to one service base URL and API key
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: Url,
    api_key: String,
    user_agent: String,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self> {
        Self::with_settings(&ServiceSettings::default())
    }

    /// Create a new HTTP client with custom settings
    pub fn with_settings(settings: &ServiceSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            base_url: Url::parse(&settings.base_url)?,
            api_key: settings.api_key.clone(),
            user_agent: format!("facesearch-rs/{}", crate::VERSION),
        })
    }

    /// Absolute URL of a service endpoint
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Execute one service request
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.endpoint_url(&request.endpoint);
        let mut req_builder = self
            .client
            .post(&url)
            .header("User-Agent", &self.user_agent)
            .header("Authorization", &self.api_key);

        if let Some(ref body) = request.body {
            req_builder = match body {
                RequestBody::Json(json) => req_builder.json(json),
                RequestBody::Multipart(file) => {
                    let part = Part::bytes(file.bytes.clone())
                        .file_name(file.file_name.clone())
                        .mime_str(&file.content_type)?;
                    req_builder.multipart(Form::new().part(file.field.clone(), part))
                }
            };
        }

        let response = req_builder.send().await?;

        Self::parse_response(response).await
    }

    /// Fetch an arbitrary URL without service credentials
    pub async fn fetch(&self, url: &Url) -> Result<ApiResponse, TransportError> {
        let response = self
            .client
            .get(url.as_str())
            .timeout(IMAGE_FETCH_TIMEOUT)
            .header("User-Agent", &self.user_agent)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Parse response into ApiResponse
    async fn parse_response(response: Response) -> Result<ApiResponse, TransportError> {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await?.to_vec();

        Ok(ApiResponse {
            status,
            content_type,
            body,
        })
    }
}

#[async_trait]
impl Dispatch for HttpClient {
    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.execute(request).await
    }
}
