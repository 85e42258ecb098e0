//! Search orchestration module
//!
//! Drives one face search through upload and polling to a report, one
//! search at a time, and reports progress along the way.

mod executor;
mod media;
mod models;
mod progress;

pub use executor::FaceSearch;
pub use media::resolve_image;
pub use models::*;
pub use progress::*;

use crate::network::TransportError;
use thiserror::Error;

/// Terminal failure of a search
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchError {
    /// The service did not hand out a search id for the image
    #[error("failed to upload image")]
    UploadFailed,

    /// The service reported an error or answered with something unusable
    #[error("search service error: {message}")]
    Server { message: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}
