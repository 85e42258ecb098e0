//! Face search orchestration: upload, poll until complete, report

use super::models::{
    AccountInfo, PollResponse, SearchHandle, SearchReport, SearchRequest, UploadResponse,
};
use super::progress::{ProgressSink, ProgressTracker};
use super::SearchError;
use crate::config::Settings;
use crate::network::{ApiRequest, FilePart, HttpClient, PacedTransport, RetryPolicy};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

const UPLOAD_ENDPOINT: &str = "upload_pic";
const SEARCH_ENDPOINT: &str = "search";
const INFO_ENDPOINT: &str = "info";

/// Multipart field the service expects the image under
const UPLOAD_FIELD: &str = "images";

/// Longest response excerpt written to the log
const LOG_EXCERPT: usize = 500;

/// Runs face searches one at a time against the search service
pub struct FaceSearch {
    transport: Arc<PacedTransport>,
    /// Single-flight gate; tokio's mutex queues waiters in FIFO order
    gate: Mutex<()>,
    poll_interval: Duration,
    default_demo: bool,
}

impl FaceSearch {
    /// Create a new search orchestrator
    pub fn new(transport: Arc<PacedTransport>) -> Self {
        Self {
            transport,
            gate: Mutex::new(()),
            poll_interval: Duration::from_secs(3),
            default_demo: false,
        }
    }

    /// Build the client, transport and orchestrator from settings
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        settings.validate()?;
        let client = HttpClient::with_settings(&settings.service)?;
        let transport = PacedTransport::new(Arc::new(client), RetryPolicy::from(&settings.pacing));

        Ok(Self::new(Arc::new(transport))
            .with_poll_interval(settings.polling.poll_interval())
            .with_demo(settings.service.demo))
    }

    /// Set poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set default demo mode
    pub fn with_demo(mut self, demo: bool) -> Self {
        self.default_demo = demo;
        self
    }

    /// Run one search to completion or failure
    ///
    /// Concurrent callers wait for the gate and run one after another, so the
    /// network calls of two searches never interleave.
    pub async fn orchestrate(
        &self,
        request: SearchRequest,
        sink: &dyn ProgressSink,
    ) -> Result<SearchReport, SearchError> {
        let _turn = self.gate.lock().await;
        let demo = request.demo.unwrap_or(self.default_demo);

        let outcome = match self.upload(&request).await {
            Ok(handle) => self.poll_until_complete(&handle, demo, sink).await,
            Err(e) => Err(e),
        };

        match &outcome {
            Ok(report) => info!(
                "Search complete: {} results, {:?} faces scanned in {:.1}s",
                report.matches.len(),
                report.scanned_count,
                report.elapsed_seconds
            ),
            Err(e) => error!("Search failed: {}", e),
        }
        outcome
    }

    /// Upload the image and obtain a search handle
    async fn upload(&self, request: &SearchRequest) -> Result<SearchHandle, SearchError> {
        let api_request = ApiRequest::post(UPLOAD_ENDPOINT).multipart(FilePart {
            field: UPLOAD_FIELD.to_string(),
            file_name: request.file_name.clone(),
            content_type: request.content_type.clone(),
            bytes: request.image.clone(),
        });

        let response = self.transport.send(&api_request).await?;
        let text = response.text();
        info!(
            "Upload response: status={}, body={}",
            response.status,
            excerpt(&text, LOG_EXCERPT)
        );

        if !response.is_success() {
            return Err(SearchError::UploadFailed);
        }

        let upload: UploadResponse = response.json().map_err(|e| {
            warn!("Unreadable upload response: {}", e);
            SearchError::UploadFailed
        })?;

        upload
            .id_search
            .filter(|id| !id.is_empty())
            .map(SearchHandle::new)
            .ok_or(SearchError::UploadFailed)
    }

    /// Poll the search endpoint until the service reports completion or an error
    async fn poll_until_complete(
        &self,
        handle: &SearchHandle,
        demo: bool,
        sink: &dyn ProgressSink,
    ) -> Result<SearchReport, SearchError> {
        let request = ApiRequest::post(SEARCH_ENDPOINT).json(json!({
            "id_search": handle.as_str(),
            "with_progress": true,
            "status_only": false,
            "demo": demo,
        }));
        let mut tracker = ProgressTracker::new();

        loop {
            let response = self.transport.send(&request).await?;
            if !response.is_success() {
                return Err(SearchError::Server {
                    message: format!("search request failed with HTTP {}", response.status),
                });
            }

            let poll: PollResponse = response.json().map_err(|e| SearchError::Server {
                message: format!("malformed search response: {}", e),
            })?;

            if let Some(message) = poll.error() {
                return Err(SearchError::Server {
                    message: message.to_string(),
                });
            }

            let progress = poll.progress();
            for threshold in tracker.advance(progress) {
                sink.on_progress(threshold).await;
            }
            debug!("Search {} progress: {}%", handle, progress);

            if progress >= 100 {
                return Ok(poll.into_report());
            }

            sleep(self.poll_interval).await;
        }
    }

    /// Query remaining service credits
    pub async fn account_info(&self) -> Result<AccountInfo, SearchError> {
        let response = self.transport.send(&ApiRequest::post(INFO_ENDPOINT)).await?;
        if !response.is_success() {
            return Err(SearchError::Server {
                message: format!("info request failed with HTTP {}", response.status),
            });
        }

        response.json().map_err(|e| SearchError::Server {
            message: format!("malformed info response: {}", e),
        })
    }
}

/// Cut `text` to at most `max` characters for logging
fn excerpt(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
