//! Settings structures for FaceSearch-RS configuration

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Main settings structure matching settings.yml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub service: ServiceSettings,
    pub pacing: PacingSettings,
    pub polling: PollingSettings,
    pub store: StoreSettings,
    pub alerts: AlertSettings,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }

    /// Merge with environment variables (FACESEARCH_* prefix)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("FACESEARCH_API_KEY") {
            self.service.api_key = val;
        }
        if let Ok(val) = std::env::var("FACESEARCH_BASE_URL") {
            self.service.base_url = val;
        }
        if let Ok(val) = std::env::var("FACESEARCH_DEMO") {
            self.service.demo = val.parse().unwrap_or(false);
        }
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.service.base_url)?;
        ensure!(self.pacing.max_retries >= 1, "pacing.max_retries must be at least 1");
        ensure!(
            self.store.reminder_delay < self.store.results_ttl,
            "store.reminder_delay ({}s) must be shorter than store.results_ttl ({}s)",
            self.store.reminder_delay,
            self.store.results_ttl
        );
        ensure!(
            self.store.free_results_count <= self.store.max_results,
            "store.free_results_count must not exceed store.max_results"
        );
        ensure!(self.store.sweep_interval >= 1, "store.sweep_interval must be at least 1s");

        ensure_seconds("service.request_timeout", self.service.request_timeout)?;
        ensure!(
            self.service.request_timeout > 0.0,
            "service.request_timeout must be positive"
        );
        ensure_seconds("pacing.min_request_interval", self.pacing.min_request_interval)?;
        ensure_seconds("pacing.rate_limit_backoff", self.pacing.rate_limit_backoff)?;
        ensure_seconds("pacing.timeout_backoff", self.pacing.timeout_backoff)?;
        ensure_seconds("polling.poll_interval", self.polling.poll_interval)?;
        Ok(())
    }
}

/// Fractional seconds must be representable as a `Duration`
fn ensure_seconds(name: &str, value: f64) -> Result<()> {
    ensure!(
        Duration::try_from_secs_f64(value).is_ok(),
        "{} must be a finite, non-negative number of seconds (got {})",
        name,
        value
    );
    Ok(())
}

/// External search service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// API root, endpoints are appended as path segments
    pub base_url: String,
    /// Sent verbatim in the Authorization header
    pub api_key: String,
    /// Run searches in demo mode unless the request says otherwise
    pub demo: bool,
    /// Per-request timeout in seconds
    pub request_timeout: f64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            base_url: "https://facecheck.id/api".to_string(),
            api_key: String::new(),
            demo: false,
            request_timeout: 120.0,
        }
    }
}

impl ServiceSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout)
    }
}

/// Outbound request pacing and retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingSettings {
    /// Minimum spacing between request starts, in seconds
    pub min_request_interval: f64,
    /// Total attempts per request
    pub max_retries: u32,
    /// Backoff unit after a 429, multiplied by the attempt number
    pub rate_limit_backoff: f64,
    /// Backoff unit after a timeout, multiplied by the attempt number
    pub timeout_backoff: f64,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            min_request_interval: 5.0,
            max_retries: 3,
            rate_limit_backoff: 30.0,
            timeout_backoff: 5.0,
        }
    }
}

/// Poll loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    /// Delay between poll requests, in seconds
    pub poll_interval: f64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self { poll_interval: 3.0 }
    }
}

impl PollingSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval)
    }
}

/// Ephemeral result store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Lifetime of a stored result, in seconds
    pub results_ttl: u64,
    /// Delay after insertion before the expiry reminder fires, in seconds
    pub reminder_delay: u64,
    /// Matches visible before the entry is unlocked
    pub free_results_count: usize,
    /// Matches visible once unlocked
    pub max_results: usize,
    /// Period of the background purge, in seconds
    pub sweep_interval: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            results_ttl: 30 * 60,
            reminder_delay: 25 * 60,
            free_results_count: 3,
            max_results: 10,
            sweep_interval: 60,
        }
    }
}

impl StoreSettings {
    pub fn results_ttl(&self) -> Duration {
        Duration::from_secs(self.results_ttl)
    }

    pub fn reminder_delay(&self) -> Duration {
        Duration::from_secs(self.reminder_delay)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval)
    }
}

/// Operator alert settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    /// Remaining service credits at or below which the balance counts as low
    pub balance_alert_threshold: u64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            balance_alert_threshold: 50,
        }
    }
}
