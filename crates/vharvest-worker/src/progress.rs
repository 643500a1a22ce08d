//! Progress tracking for the running batch.
//!
//! The driver is the only writer. Pollers read through [`ProgressTracker::snapshot`],
//! which clones the state out under the read lock.

use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use vharvest_models::{
    ItemOutcome, ItemStatus, ItemSummary, ProgressSnapshot, RemainingTime, RunStatus,
};

#[derive(Debug, Default)]
struct TrackerState {
    current: usize,
    total: usize,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
    successful: Vec<ItemSummary>,
    unsuccessful: Vec<ItemSummary>,
    invalid: Vec<ItemSummary>,
    last_log: String,
    running: bool,
    stopped: bool,
}

impl TrackerState {
    fn elapsed(&self) -> Duration {
        match self.started_at {
            Some(start) => self
                .finished_at
                .unwrap_or_else(Instant::now)
                .saturating_duration_since(start),
            None => Duration::ZERO,
        }
    }
}

#[derive(Debug, Default)]
pub struct ProgressTracker {
    state: RwLock<TrackerState>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a run over `total` rows. Clears the previous run's lists.
    pub async fn begin(&self, total: usize) {
        let mut state = self.state.write().await;
        let last_log = std::mem::take(&mut state.last_log);
        *state = TrackerState {
            total,
            started_at: Some(Instant::now()),
            running: true,
            last_log,
            ..Default::default()
        };
    }

    /// Append an outcome to its classification list.
    pub async fn record(&self, outcome: &ItemOutcome) {
        let summary = ItemSummary::from(outcome);
        let mut state = self.state.write().await;
        match outcome.status {
            ItemStatus::Successful => state.successful.push(summary),
            ItemStatus::Unsuccessful => state.unsuccessful.push(summary),
            ItemStatus::Invalid => state.invalid.push(summary),
        }
    }

    /// Advance `current`. Never moves backwards within a run.
    pub async fn set_current(&self, current: usize) {
        let mut state = self.state.write().await;
        state.current = state.current.max(current);
    }

    /// Replace the human-readable status line.
    pub async fn log(&self, line: impl Into<String>) {
        self.state.write().await.last_log = line.into();
    }

    pub async fn finish(&self, status: RunStatus) {
        let mut state = self.state.write().await;
        state.running = false;
        state.stopped = status == RunStatus::Stopped;
        state.finished_at = Some(Instant::now());
    }

    /// Zero every counter and clear every list and the status line.
    pub async fn reset(&self) {
        *self.state.write().await = TrackerState::default();
    }

    pub async fn is_running(&self) -> bool {
        self.state.read().await.running
    }

    /// Summary of a successful item from the current run.
    pub async fn successful(&self, id_tag: &str) -> Option<ItemSummary> {
        self.state
            .read()
            .await
            .successful
            .iter()
            .find(|s| s.id_tag == id_tag)
            .cloned()
    }

    pub async fn snapshot(&self) -> ProgressSnapshot {
        let state = self.state.read().await;
        let elapsed = state.elapsed();

        ProgressSnapshot {
            current: state.current,
            total: state.total,
            successful_count: state.successful.len(),
            unsuccessful_count: state.unsuccessful.len(),
            invalid_links_count: state.invalid.len(),
            successful_details: state.successful.clone(),
            unsuccessful_details: state.unsuccessful.clone(),
            invalid_details: state.invalid.clone(),
            current_log: state.last_log.clone(),
            elapsed_time: elapsed.as_secs(),
            remaining_time: RemainingTime::estimate(
                elapsed.as_secs_f64(),
                state.current,
                state.total,
            ),
            running: state.running,
            stopped: state.stopped,
        }
    }
}
