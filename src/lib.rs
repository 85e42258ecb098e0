//! FaceSearch-RS: paced client and ephemeral result store for a face-search API
//!
//! A search uploads an image, polls the service until it finishes and returns
//! the matches. Requests are spaced out and retried under throttling, and only
//! one search runs at a time. Completed searches live in a [`store::ResultStore`]
//! for a limited time, with a preview/unlocked view and a reminder before expiry.

pub mod config;
pub mod network;
pub mod search;
pub mod store;

pub use config::Settings;
pub use search::{FaceSearch, SearchError, SearchReport, SearchRequest};
pub use store::ResultStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
