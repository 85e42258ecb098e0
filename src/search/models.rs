//! Search request, wire payloads and result models

use serde::{Deserialize, Serialize};
use std::fmt;

/// Image submitted for a face search
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Raw image bytes
    pub image: Vec<u8>,
    /// MIME type of the image
    pub content_type: String,
    /// File name reported in the upload
    pub file_name: String,
    /// Demo mode override, `None` uses the configured default
    pub demo: Option<bool>,
}

impl SearchRequest {
    /// Create a JPEG search request
    pub fn new(image: impl Into<Vec<u8>>) -> Self {
        Self {
            image: image.into(),
            content_type: "image/jpeg".to_string(),
            file_name: "photo.jpg".to_string(),
            demo: None,
        }
    }

    /// Set content type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Set file name
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    /// Force demo mode on or off
    pub fn with_demo(mut self, demo: bool) -> Self {
        self.demo = Some(demo);
        self
    }
}

/// Server-issued identifier tying an upload to its poll requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHandle(String);

impl SearchHandle {
    pub(crate) fn new(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single face match, in the order the service returned it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    /// Similarity score, 0-100
    #[serde(default)]
    pub score: f64,
    /// Page the face was found on
    #[serde(default)]
    pub url: String,
    /// Inline image, usually a `data:image/...;base64,` URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumb_url: Option<String>,
}

impl Match {
    pub fn new(score: f64, url: impl Into<String>) -> Self {
        Self {
            score,
            url: url.into(),
            base64: None,
            image_url: None,
            thumb_url: None,
        }
    }
}

/// Completed search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchReport {
    /// `id_search` echoed by the service, when present
    pub search_id: Option<String>,
    /// Matches in server order
    pub matches: Vec<Match>,
    /// Number of faces the service scanned
    pub scanned_count: Option<u64>,
    /// Server-side search duration
    pub elapsed_seconds: f64,
}

impl SearchReport {
    /// Key to store this report under; `fallback` is used when the service sent no id
    pub fn store_key(&self, fallback: &str) -> String {
        self.search_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }

    /// Number of matches shown at most
    pub fn displayed_count(&self, max_results: usize) -> usize {
        self.matches.len().min(max_results)
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

/// Account status from the info endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub remaining_credits: u64,
}

impl AccountInfo {
    /// Whether the balance is at or below the alert threshold
    pub fn is_low(&self, threshold: u64) -> bool {
        self.remaining_credits <= threshold
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadResponse {
    #[serde(default)]
    pub id_search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PollResponse {
    #[serde(default)]
    pub progress: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub output: Option<PollOutput>,
    #[serde(default)]
    pub id_search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PollOutput {
    #[serde(default)]
    pub items: Vec<Match>,
    #[serde(default, rename = "searchedFaces")]
    pub searched_faces: Option<u64>,
    #[serde(default, rename = "tookSeconds")]
    pub took_seconds: Option<f64>,
}

impl PollResponse {
    /// Progress clamped to 0-100, missing counts as 0
    pub fn progress(&self) -> u8 {
        self.progress.unwrap_or(0).min(100) as u8
    }

    /// Server-reported error, ignoring empty strings
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }

    pub fn into_report(self) -> SearchReport {
        let output = self.output.unwrap_or_default();
        SearchReport {
            search_id: self.id_search,
            matches: output.items,
            scanned_count: output.searched_faces,
            elapsed_seconds: output.took_seconds.unwrap_or(0.0),
        }
    }
}
