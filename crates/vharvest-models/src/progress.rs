//! Progress snapshot types returned to pollers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::outcome::ItemSummary;

/// Estimated time remaining, split the way the dashboard shows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemainingTime {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl RemainingTime {
    pub fn from_secs(total: u64) -> Self {
        Self {
            hours: total / 3600,
            minutes: (total % 3600) / 60,
            seconds: total % 60,
        }
    }

    /// Linear ETA: average time per finished row times rows left.
    ///
    /// Zero before the first row finishes and once every row is done.
    /// `elapsed_secs` keeps its fraction; rounding happens on the result.
    pub fn estimate(elapsed_secs: f64, current: usize, total: usize) -> Self {
        if current == 0 || current >= total {
            return Self::default();
        }
        let per_item = elapsed_secs.max(0.0) / current as f64;
        let remaining = (per_item * (total - current) as f64).round() as u64;
        Self::from_secs(remaining)
    }

    pub fn as_secs(&self) -> u64 {
        self.hours * 3600 + self.minutes * 60 + self.seconds
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every row was processed
    Completed,
    /// A stop was requested; remaining rows were left untouched
    Stopped,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Stopped => "stopped",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Point-in-time view of a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub current: usize,
    pub total: usize,
    pub successful_count: usize,
    pub unsuccessful_count: usize,
    pub invalid_links_count: usize,
    pub successful_details: Vec<ItemSummary>,
    pub unsuccessful_details: Vec<ItemSummary>,
    pub invalid_details: Vec<ItemSummary>,
    pub current_log: String,
    /// Seconds since the run started
    pub elapsed_time: u64,
    pub remaining_time: RemainingTime,
    pub running: bool,
    pub stopped: bool,
}
