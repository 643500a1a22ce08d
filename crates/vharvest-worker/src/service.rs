//! Caller-facing harvest operations.
//!
//! `HarvestService` owns the shared pieces (store, extractor, stop flag,
//! tracker, ledger) and runs at most one batch at a time on a background
//! task. The HTTP layer and the CLI both drive it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info};
use vharvest_media::{Extractor, YtDlpExtractor};
use vharvest_models::{
    ArtifactKey, ArtifactKind, BatchDate, ItemDetail, LinkRecord, ProgressSnapshot,
};
use vharvest_storage::ArtifactStore;

use crate::config::HarvestConfig;
use crate::control::ControlFlag;
use crate::driver::{JobDriver, RunResult};
use crate::error::{WorkerError, WorkerResult};
use crate::ledger::{self, Ledger};
use crate::pipeline::ItemPipeline;
use crate::progress::ProgressTracker;

/// Lifetime of presigned links handed out by `item_detail`.
const PRESIGN_TTL: Duration = Duration::from_secs(3600);

/// Outcome of a retry request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStart {
    Started(usize),
    NothingToRetry,
}

pub struct HarvestService {
    config: HarvestConfig,
    store: Arc<dyn ArtifactStore>,
    extractor: Arc<dyn Extractor>,
    control: Arc<ControlFlag>,
    tracker: Arc<ProgressTracker>,
    ledger: Ledger,
    active: Mutex<Option<JoinHandle<()>>>,
    batch: RwLock<Option<BatchDate>>,
    fixed_batch: Option<BatchDate>,
}

impl HarvestService {
    pub fn new(
        config: HarvestConfig,
        store: Arc<dyn ArtifactStore>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        Self {
            control: Arc::new(ControlFlag::open(&config.stop_marker)),
            ledger: Ledger::new(&config.ledger_path),
            tracker: Arc::new(ProgressTracker::new()),
            config,
            store,
            extractor,
            active: Mutex::new(None),
            batch: RwLock::new(None),
            fixed_batch: None,
        }
    }

    /// yt-dlp extractor plus the store selected by the environment.
    pub fn from_env(config: HarvestConfig) -> WorkerResult<Self> {
        let store = vharvest_storage::store_from_env()?;
        let extractor = Arc::new(YtDlpExtractor::new(config.extractor_config()));
        Ok(Self::new(config, store, extractor))
    }

    /// Group every run under `batch` instead of today's date.
    pub fn with_batch_date(mut self, batch: BatchDate) -> Self {
        self.fixed_batch = Some(batch);
        self
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Begin processing `rows` in the background. Returns the row count.
    pub async fn start(&self, rows: Vec<LinkRecord>) -> WorkerResult<usize> {
        let mut active = self.active.lock().await;
        self.ensure_idle(&active)?;

        let total = rows.len();
        let (driver, batch) = self.prepare().await;
        let sink = self.ledger.clone();

        *active = Some(tokio::spawn(async move {
            let result = driver.run(&rows, batch, "fetch").await;
            if let Err(e) = sink.write(ledger::rows_for(&result.outcomes)).await {
                error!("Failed to write ledger: {}", e);
            }
        }));

        info!(total, "Batch accepted");
        Ok(total)
    }

    /// Reprocess the rows the ledger marks as failed.
    pub async fn retry(&self) -> WorkerResult<RetryStart> {
        let mut active = self.active.lock().await;
        self.ensure_idle(&active)?;

        let previous = self.ledger.read().await?;
        let rows = ledger::failed_links(&previous);
        if rows.is_empty() {
            return Ok(RetryStart::NothingToRetry);
        }

        let total = rows.len();
        let (driver, batch) = self.prepare().await;
        let sink = self.ledger.clone();

        *active = Some(tokio::spawn(async move {
            let result: RunResult = driver.run(&rows, batch, "retry").await;
            let merged = ledger::merge(&previous, &result.outcomes);
            if let Err(e) = sink.write(merged).await {
                error!("Failed to write ledger: {}", e);
            }
        }));

        info!(total, "Retry accepted");
        Ok(RetryStart::Started(total))
    }

    pub async fn signal_stop(&self) -> WorkerResult<()> {
        self.control.signal().await
    }

    pub async fn poll_progress(&self) -> ProgressSnapshot {
        self.tracker.snapshot().await
    }

    /// Clear the stop flag, zero progress and wipe the work directory.
    ///
    /// Refused while a run is still unwinding; stop it and poll until it
    /// reports not running first.
    pub async fn reset(&self) -> WorkerResult<()> {
        let mut active = self.active.lock().await;
        if is_running(&active) {
            return Err(WorkerError::AlreadyRunning);
        }
        *active = None;

        self.control.clear().await?;
        self.tracker.reset().await;
        *self.batch.write().await = None;

        match tokio::fs::remove_dir_all(&self.config.work_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&self.config.work_dir).await?;

        info!("Harvest state reset");
        Ok(())
    }

    /// Stored artifacts of an item from the current successful list.
    pub async fn item_detail(&self, id_tag: &str) -> WorkerResult<ItemDetail> {
        let summary = self
            .tracker
            .successful(id_tag)
            .await
            .ok_or_else(|| WorkerError::not_found(format!("item {}", id_tag)))?;
        let batch = self.current_batch().await;
        let key = |kind| ArtifactKey::new(batch, id_tag, kind);

        let title = self.store.fetch(&key(ArtifactKind::Title)).await?;
        let description = self.store.fetch(&key(ArtifactKind::Description)).await?;

        Ok(ItemDetail {
            id_tag: summary.id_tag,
            source_url: summary.source_url,
            title: String::from_utf8_lossy(&title).into_owned(),
            description: String::from_utf8_lossy(&description).into_owned(),
            thumbnail_url: self
                .store
                .presign_get(&key(ArtifactKind::Thumbnail), PRESIGN_TTL)
                .await?,
            video_url: self
                .store
                .presign_get(&key(ArtifactKind::Video), PRESIGN_TTL)
                .await?,
        })
    }

    /// Wait for the background run, if any, to finish.
    ///
    /// Cancel-safe: dropping the future leaves the run tracked.
    pub async fn wait(&self) {
        let mut active = self.active.lock().await;
        if let Some(handle) = active.as_mut() {
            if let Err(e) = handle.await {
                error!("Batch task failed: {}", e);
            }
            *active = None;
        }
    }

    pub async fn is_running(&self) -> bool {
        is_running(&*self.active.lock().await)
    }

    fn ensure_idle(&self, active: &Option<JoinHandle<()>>) -> WorkerResult<()> {
        if is_running(active) {
            return Err(WorkerError::AlreadyRunning);
        }
        if self.control.poll() {
            return Err(WorkerError::Stopped);
        }
        Ok(())
    }

    async fn prepare(&self) -> (JobDriver, BatchDate) {
        let batch = self.fixed_batch.unwrap_or_else(BatchDate::today);
        *self.batch.write().await = Some(batch);

        let pipeline = ItemPipeline::new(
            &self.config,
            self.extractor.clone(),
            self.store.clone(),
            self.control.clone(),
            self.tracker.clone(),
        );
        let driver = JobDriver::new(pipeline, self.tracker.clone(), self.control.clone());
        (driver, batch)
    }

    async fn current_batch(&self) -> BatchDate {
        self.batch
            .read()
            .await
            .or(self.fixed_batch)
            .unwrap_or_else(BatchDate::today)
    }
}

fn is_running(active: &Option<JoinHandle<()>>) -> bool {
    active.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::*;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};
    use vharvest_models::LedgerRow;

    struct Fixture {
        dir: TempDir,
        extractor: Arc<FakeExtractor>,
        store: Arc<CountingStore>,
        service: HarvestService,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let config = HarvestConfig {
            work_dir: dir.path().join("work"),
            ledger_path: dir.path().join("ledger.csv"),
            stop_marker: dir.path().join("stop"),
            upload_retries: 0,
            ..Default::default()
        };
        let extractor = Arc::new(FakeExtractor::new());
        let store = Arc::new(CountingStore::new());
        let service = HarvestService::new(config, store.clone(), extractor.clone())
            .with_batch_date(BatchDate::from_ymd(2024, 5, 1).unwrap());
        Fixture {
            dir,
            extractor,
            store,
            service,
        }
    }

    fn url(i: usize) -> String {
        format!("https://www.youtube.com/watch?v=video{:06}", i)
    }

    fn rows(n: usize) -> Vec<LinkRecord> {
        (0..n).map(|i| LinkRecord::new(format!("T{}", i), url(i))).collect()
    }

    #[tokio::test]
    async fn test_start_runs_and_writes_ledger() {
        let f = fixture();
        f.extractor.script(&url(1), ArtifactKind::Title, Script::Fail);
        let mut input = rows(3);
        input[2].source_url = "bad".into();

        assert_eq!(f.service.start(input).await.unwrap(), 3);
        f.service.wait().await;

        let snap = f.service.poll_progress().await;
        assert_eq!((snap.current, snap.total), (3, 3));
        assert_eq!(snap.successful_count, 1);
        assert_eq!(snap.unsuccessful_count, 1);
        assert_eq!(snap.invalid_links_count, 1);

        let ledger = f.service.ledger.read().await.unwrap();
        let bits: Vec<_> = ledger.iter().map(|r| (r.success, r.failure)).collect();
        assert_eq!(bits, vec![(1, 0), (0, 1), (0, 0)]);
    }

    #[tokio::test]
    async fn test_retry_processes_only_failed_rows() {
        let f = fixture();
        f.service
            .ledger
            .write(vec![
                LedgerRow { id_tag: "T0".into(), link: url(0), success: 1, failure: 0 },
                LedgerRow { id_tag: "T1".into(), link: url(1), success: 0, failure: 1 },
                LedgerRow { id_tag: "T2".into(), link: "bad".into(), success: 0, failure: 0 },
            ])
            .await
            .unwrap();

        assert_eq!(f.service.retry().await.unwrap(), RetryStart::Started(1));
        f.service.wait().await;

        assert!(f.extractor.fetched().iter().all(|(_, u)| *u == url(1)));
        assert_eq!(f.extractor.calls(), 4);

        let ledger = f.service.ledger.read().await.unwrap();
        assert_eq!(ledger.len(), 3);
        assert_eq!((ledger[0].success, ledger[0].failure), (1, 0));
        assert_eq!((ledger[1].success, ledger[1].failure), (1, 0));
        assert_eq!((ledger[2].success, ledger[2].failure), (0, 0));

        assert_eq!(f.service.retry().await.unwrap(), RetryStart::NothingToRetry);
    }

    #[tokio::test]
    async fn test_stop_then_reset() {
        let f = fixture();
        f.service.signal_stop().await.unwrap();

        let err = assert_err!(f.service.start(rows(2)).await);
        assert!(matches!(err, WorkerError::Stopped));

        tokio::fs::create_dir_all(f.dir.path().join("work/Video")).await.unwrap();
        tokio::fs::write(f.dir.path().join("work/Video/stale.mp4"), b"x").await.unwrap();

        assert_ok!(f.service.reset().await);
        let snap = f.service.poll_progress().await;
        assert_eq!((snap.current, snap.total), (0, 0));
        assert!(!f.service.control.poll());
        assert!(!f.dir.path().join("work/Video/stale.mp4").exists());

        f.service.start(rows(1)).await.unwrap();
        f.service.wait().await;
        assert_eq!(f.service.poll_progress().await.successful_count, 1);
    }

    #[tokio::test]
    async fn test_stopped_run_only_ledgers_processed_rows() {
        let f = fixture();
        f.extractor.stop_after(5, f.service.control.clone());

        f.service.start(rows(3)).await.unwrap();
        f.service.wait().await;

        let snap = f.service.poll_progress().await;
        assert!(snap.stopped);
        let ledger = f.service.ledger.read().await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].id_tag, "T0");
    }

    #[tokio::test]
    async fn test_item_detail() {
        let f = fixture();
        f.service.start(rows(1)).await.unwrap();
        f.service.wait().await;

        let detail = f.service.item_detail("T0").await.unwrap();
        assert_eq!(detail.title, format!("title:{}", url(0)));
        assert!(detail.video_url.contains("2024-05-01-Batch/Video/T0-Video.mp4"));
        assert!(f.store.uploads() >= 4);

        assert!(matches!(
            f.service.item_detail("nope").await,
            Err(WorkerError::NotFound(_))
        ));
    }
}
