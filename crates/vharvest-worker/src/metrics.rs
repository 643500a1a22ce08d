//! Harvest metrics. Recorded through the `metrics` facade; a no-op unless a
//! recorder is installed by the host binary.

use metrics::{counter, histogram};
use vharvest_models::{ArtifactKind, ArtifactState, ItemStatus, RunStatus};

pub mod names {
    pub const ITEMS_TOTAL: &str = "vharvest_items_total";
    pub const ARTIFACTS_TOTAL: &str = "vharvest_artifacts_total";
    pub const RUNS_TOTAL: &str = "vharvest_runs_total";
    pub const ITEM_DURATION_SECONDS: &str = "vharvest_item_duration_seconds";
}

/// Record one classified item.
pub fn record_item(status: ItemStatus, duration_secs: f64) {
    let labels = [("status", status.as_str().to_string())];
    counter!(names::ITEMS_TOTAL, &labels).increment(1);
    histogram!(names::ITEM_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record the final state of one artifact.
pub fn record_artifact(kind: ArtifactKind, state: ArtifactState) {
    let labels = [
        ("kind", kind.as_str().to_string()),
        ("state", state.as_str().to_string()),
    ];
    counter!(names::ARTIFACTS_TOTAL, &labels).increment(1);
}

pub fn record_run(status: RunStatus) {
    let labels = [("status", status.as_str().to_string())];
    counter!(names::RUNS_TOTAL, &labels).increment(1);
}
