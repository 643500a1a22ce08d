//! Sequential batch driver.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::Instrument;
use vharvest_models::{BatchDate, ItemOutcome, LinkRecord, RunStatus};

use crate::control::ControlFlag;
use crate::logging::BatchLogger;
use crate::metrics;
use crate::pipeline::{ItemPipeline, ScrapeResult};
use crate::progress::ProgressTracker;

/// Result of one run over a row sequence.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub status: RunStatus,
    /// Outcomes of processed rows, in input order. Rows never reached are absent.
    pub outcomes: Vec<ItemOutcome>,
}

impl RunResult {
    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }
}

pub struct JobDriver {
    pipeline: ItemPipeline,
    tracker: Arc<ProgressTracker>,
    control: Arc<ControlFlag>,
}

impl JobDriver {
    pub fn new(
        pipeline: ItemPipeline,
        tracker: Arc<ProgressTracker>,
        control: Arc<ControlFlag>,
    ) -> Self {
        Self {
            pipeline,
            tracker,
            control,
        }
    }

    /// Process `rows` in order until done or a stop is requested.
    pub async fn run(&self, rows: &[LinkRecord], batch: BatchDate, operation: &str) -> RunResult {
        let logger = BatchLogger::new(batch, operation);
        self.run_rows(rows, batch, &logger)
            .instrument(logger.create_span())
            .await
    }

    async fn run_rows(
        &self,
        rows: &[LinkRecord],
        batch: BatchDate,
        logger: &BatchLogger,
    ) -> RunResult {
        let total = rows.len();
        self.tracker.begin(total).await;
        logger.log_start(&format!("{} rows", total));

        let mut outcomes = Vec::with_capacity(total);
        let mut status = RunStatus::Completed;

        for (index, row) in rows.iter().enumerate() {
            if self.control.poll() {
                status = RunStatus::Stopped;
                break;
            }

            self.tracker
                .log(format!(
                    "Processing row {}/{}: {}",
                    index + 1,
                    total,
                    row.id_tag
                ))
                .await;

            let started = Instant::now();
            match self.pipeline.scrape(row, batch).await {
                ScrapeResult::Done(outcome) => {
                    metrics::record_item(outcome.status, started.elapsed().as_secs_f64());
                    logger.log_progress(&format!(
                        "{} {} ({}/{})",
                        outcome.id_tag,
                        outcome.status,
                        index + 1,
                        total
                    ));
                    self.tracker.record(&outcome).await;
                    self.tracker.set_current(index + 1).await;
                    outcomes.push(outcome);
                }
                ScrapeResult::Stopped => {
                    status = RunStatus::Stopped;
                    break;
                }
            }
        }

        match status {
            RunStatus::Completed => {
                self.tracker.log("Scraping completed.").await;
                logger.log_completion(&format!("{} of {} rows processed", outcomes.len(), total));
            }
            RunStatus::Stopped => {
                self.tracker.log("Scraping stopped by user.").await;
                logger.log_warning(&format!(
                    "stopped after {} of {} rows",
                    outcomes.len(),
                    total
                ));
            }
        }

        self.tracker.finish(status).await;
        metrics::record_run(status);

        RunResult { status, outcomes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarvestConfig;
    use crate::pipeline::test_support::*;
    use tempfile::TempDir;
    use vharvest_models::ItemStatus;

    struct Fixture {
        _dir: TempDir,
        extractor: Arc<FakeExtractor>,
        control: Arc<ControlFlag>,
        tracker: Arc<ProgressTracker>,
        driver: JobDriver,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let config = HarvestConfig {
            work_dir: dir.path().join("work"),
            stop_marker: dir.path().join("stop"),
            ..Default::default()
        };
        let extractor = Arc::new(FakeExtractor::new());
        let control = Arc::new(ControlFlag::open(&config.stop_marker));
        let tracker = Arc::new(ProgressTracker::new());
        let pipeline = ItemPipeline::new(
            &config,
            extractor.clone(),
            Arc::new(CountingStore::new()),
            control.clone(),
            tracker.clone(),
        );
        Fixture {
            _dir: dir,
            extractor,
            control: control.clone(),
            tracker: tracker.clone(),
            driver: JobDriver::new(pipeline, tracker, control),
        }
    }

    fn rows(n: usize) -> Vec<LinkRecord> {
        (0..n)
            .map(|i| {
                LinkRecord::new(
                    format!("T{}", i),
                    format!("https://www.youtube.com/watch?v=video{:06}", i),
                )
            })
            .collect()
    }

    fn batch() -> BatchDate {
        BatchDate::from_ymd(2024, 5, 1).unwrap()
    }

    #[tokio::test]
    async fn test_empty_input_completes() {
        let f = fixture();
        let result = f.driver.run(&[], batch(), "fetch").await;

        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.processed(), 0);
        let snap = f.tracker.snapshot().await;
        assert_eq!((snap.current, snap.total), (0, 0));
        assert!(!snap.running);
    }

    #[tokio::test]
    async fn test_processes_every_row_in_order() {
        let f = fixture();
        let mut input = rows(3);
        input[1].source_url = "not a link".to_string();

        let result = f.driver.run(&input, batch(), "fetch").await;

        assert_eq!(result.status, RunStatus::Completed);
        let ids: Vec<_> = result.outcomes.iter().map(|o| o.id_tag.as_str()).collect();
        assert_eq!(ids, vec!["T0", "T1", "T2"]);
        assert_eq!(result.outcomes[1].status, ItemStatus::Invalid);

        let snap = f.tracker.snapshot().await;
        assert_eq!((snap.current, snap.total), (3, 3));
        assert_eq!(snap.successful_count, 2);
        assert_eq!(snap.invalid_links_count, 1);
        assert_eq!(snap.current_log, "Scraping completed.");
    }

    #[tokio::test]
    async fn test_stop_before_first_row() {
        let f = fixture();
        f.control.signal().await.unwrap();

        let result = f.driver.run(&rows(3), batch(), "fetch").await;

        assert_eq!(result.status, RunStatus::Stopped);
        assert_eq!(result.processed(), 0);
        assert_eq!(f.extractor.calls(), 0);
        assert!(f.tracker.snapshot().await.stopped);
    }

    #[tokio::test]
    async fn test_stop_mid_run_leaves_later_rows_untouched() {
        let f = fixture();
        // Row 0 takes four fetches; the stop lands during row 1's first fetch.
        f.extractor.stop_after(5, f.control.clone());

        let result = f.driver.run(&rows(4), batch(), "fetch").await;

        assert_eq!(result.status, RunStatus::Stopped);
        assert_eq!(result.processed(), 1);

        let snap = f.tracker.snapshot().await;
        assert_eq!(snap.current, 1);
        assert_eq!(snap.total, 4);
        let listed: Vec<_> = snap
            .successful_details
            .iter()
            .chain(snap.unsuccessful_details.iter())
            .map(|s| s.id_tag.clone())
            .collect();
        assert_eq!(listed, vec!["T0".to_string()]);
        assert!(snap.stopped);
    }
}
