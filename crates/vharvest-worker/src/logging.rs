//! Structured batch logging.

use tracing::{error, info, warn, Span};
use vharvest_models::BatchDate;

/// Logs batch lifecycle events with the batch and operation attached.
#[derive(Debug, Clone)]
pub struct BatchLogger {
    batch: String,
    operation: String,
}

impl BatchLogger {
    /// `operation` is e.g. "fetch" or "retry".
    pub fn new(batch: BatchDate, operation: &str) -> Self {
        Self {
            batch: batch.namespace(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            batch = %self.batch,
            operation = %self.operation,
            "Batch started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            batch = %self.batch,
            operation = %self.operation,
            "Batch progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            batch = %self.batch,
            operation = %self.operation,
            "Batch warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            batch = %self.batch,
            operation = %self.operation,
            "Batch error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            batch = %self.batch,
            operation = %self.operation,
            "Batch finished: {}", message
        );
    }

    pub fn batch(&self) -> &str {
        &self.batch
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "batch",
            batch = %self.batch,
            operation = %self.operation
        )
    }
}
