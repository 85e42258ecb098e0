//! Progress reporting for a running search

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

/// Granularity of progress notifications, in percent
pub const PROGRESS_STEP: u8 = 20;

/// Highest threshold notified; completion is reported by the result itself
const LAST_THRESHOLD: u8 = 80;

/// Receives progress updates for one search
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn on_progress(&self, percent: u8);
}

/// Sink that discards updates
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

#[async_trait]
impl ProgressSink for NoProgress {
    async fn on_progress(&self, _percent: u8) {}
}

#[async_trait]
impl ProgressSink for UnboundedSender<u8> {
    async fn on_progress(&self, percent: u8) {
        // a dropped receiver just means nobody is watching any more
        let _ = self.send(percent);
    }
}

/// Dedup state threaded through the poll loop
#[derive(Debug, Default, Clone)]
pub struct ProgressTracker {
    last_notified: u8,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Thresholds crossed by `progress` that were not notified yet, in increasing order
    pub fn advance(&mut self, progress: u8) -> Vec<u8> {
        let reached = (progress.min(100) / PROGRESS_STEP * PROGRESS_STEP).min(LAST_THRESHOLD);
        let crossed: Vec<u8> = (self.last_notified + PROGRESS_STEP..=reached)
            .step_by(PROGRESS_STEP as usize)
            .collect();

        if let Some(&last) = crossed.last() {
            self.last_notified = last;
        }
        crossed
    }

    pub fn last_notified(&self) -> u8 {
        self.last_notified
    }
}
