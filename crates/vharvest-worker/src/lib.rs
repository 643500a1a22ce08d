//! Batch harvesting worker.
//!
//! This crate provides:
//! - The stop flag (in-process token plus durable marker file)
//! - Progress tracking with ETA
//! - The per-item pipeline and the sequential job driver
//! - The CSV retry ledger and input table parsing
//! - `HarvestService`, the facade the API and CLI drive

pub mod config;
pub mod control;
pub mod driver;
pub mod error;
pub mod input;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod retry;
pub mod service;

pub use config::HarvestConfig;
pub use control::ControlFlag;
pub use driver::{JobDriver, RunResult};
pub use error::{WorkerError, WorkerResult};
pub use input::parse_link_table;
pub use ledger::Ledger;
pub use logging::BatchLogger;
pub use pipeline::{ItemPipeline, ScrapeResult};
pub use progress::ProgressTracker;
pub use service::{HarvestService, RetryStart};
