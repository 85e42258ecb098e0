//! Configuration module for FaceSearch-RS
//!
//! Handles loading and validating settings from YAML files and environment variables.

mod settings;

pub use settings::*;

use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

/// Load settings from the first settings file found, or defaults, then apply the environment
pub fn load() -> Result<Settings> {
    let mut settings = match locate() {
        Some(path) => {
            info!("Loading settings from: {}", path.display());
            Settings::from_file(&path)?
        }
        None => {
            info!("No settings file found, using defaults");
            Settings::default()
        }
    };
    settings.merge_env();
    settings.validate()?;
    Ok(settings)
}

/// Find a settings file, checking FACESEARCH_SETTINGS_PATH first
fn locate() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("FACESEARCH_SETTINGS_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let mut candidates = vec![
        PathBuf::from("settings.yml"),
        PathBuf::from("config/settings.yml"),
    ];
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("facesearch-rs/settings.yml"));
    }

    candidates.into_iter().find(|p| p.exists())
}
