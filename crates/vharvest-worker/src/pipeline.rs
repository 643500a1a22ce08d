//! Per-item pipeline: validate, skip what is stored, fetch, upload, classify.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};
use vharvest_media::{Extractor, MediaError};
use vharvest_models::{
    canonical_watch_url, validate_id_tag, ArtifactKey, ArtifactKind, ArtifactState,
    ArtifactStates, BatchDate, ItemOutcome, LinkRecord,
};
use vharvest_storage::ArtifactStore;

use crate::config::HarvestConfig;
use crate::control::ControlFlag;
use crate::error::WorkerResult;
use crate::metrics;
use crate::progress::ProgressTracker;
use crate::retry::{retry_async, RetryConfig};

/// What happened to one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeResult {
    /// The row reached a terminal classification.
    Done(ItemOutcome),
    /// A stop was requested mid-item. Nothing is recorded for the row.
    Stopped,
}

/// How one artifact fetch ended.
enum FetchStep {
    Stored(ArtifactState),
    SourceUnavailable(String),
    Stopped,
}

pub struct ItemPipeline {
    extractor: Arc<dyn Extractor>,
    store: Arc<dyn ArtifactStore>,
    control: Arc<ControlFlag>,
    tracker: Arc<ProgressTracker>,
    config: HarvestConfig,
    upload_retry: RetryConfig,
}

impl ItemPipeline {
    pub fn new(
        config: &HarvestConfig,
        extractor: Arc<dyn Extractor>,
        store: Arc<dyn ArtifactStore>,
        control: Arc<ControlFlag>,
        tracker: Arc<ProgressTracker>,
    ) -> Self {
        Self {
            extractor,
            store,
            control,
            tracker,
            config: config.clone(),
            upload_retry: RetryConfig::new("artifact upload")
                .with_max_retries(config.upload_retries),
        }
    }

    /// Process one row. Never fails: errors become an Unsuccessful outcome.
    pub async fn scrape(&self, link: &LinkRecord, batch: BatchDate) -> ScrapeResult {
        let mut states = ArtifactStates::default();
        match self.try_scrape(link, batch, &mut states).await {
            Ok(result) => result,
            Err(e) => {
                warn!(id_tag = %link.id_tag, "Item failed: {}", e);
                self.tracker
                    .log(format!("Error processing {}: {}", link.source_url, e))
                    .await;
                ScrapeResult::Done(ItemOutcome::unsuccessful(link, states, e.to_string()))
            }
        }
    }

    async fn try_scrape(
        &self,
        link: &LinkRecord,
        batch: BatchDate,
        states: &mut ArtifactStates,
    ) -> WorkerResult<ScrapeResult> {
        // The tag names local files and remote keys; check it before either exists.
        if let Err(e) = validate_id_tag(&link.id_tag) {
            warn!(id_tag = ?link.id_tag, "Invalid idTag: {}", e);
            self.tracker
                .log(format!("Invalid idTag skipped: {:?}", link.id_tag))
                .await;
            return Ok(ScrapeResult::Done(ItemOutcome::invalid(link, e.to_string())));
        }

        let url = match canonical_watch_url(&link.source_url) {
            Ok(url) => url,
            Err(e) => {
                info!(id_tag = %link.id_tag, "Invalid link: {}", e);
                self.tracker
                    .log(format!("Invalid link skipped: {}", link.source_url))
                    .await;
                return Ok(ScrapeResult::Done(ItemOutcome::invalid(link, e.to_string())));
            }
        };

        for kind in ArtifactKind::PROCESSING_ORDER {
            let key = ArtifactKey::new(batch, &link.id_tag, kind);
            if self.is_stored(&key).await {
                debug!(id_tag = %link.id_tag, key = %key, "Already stored");
                self.tracker
                    .log(format!("Skipping {} for {}: already stored", kind, url))
                    .await;
                states.set(kind, ArtifactState::Skipped);
            }
        }

        for kind in ArtifactKind::PROCESSING_ORDER {
            if states.get(kind) != ArtifactState::Pending {
                continue;
            }

            let key = ArtifactKey::new(batch, &link.id_tag, kind);
            match self.fetch_artifact(kind, &url, &link.id_tag, &key).await? {
                FetchStep::Stored(state) => states.set(kind, state),
                FetchStep::SourceUnavailable(reason) => {
                    warn!(id_tag = %link.id_tag, "Source unavailable: {}", reason);
                    self.tracker
                        .log(format!("Video unavailable, skipping remaining steps for {}", url))
                        .await;
                    let mut outcome = ItemOutcome::invalid(link, reason);
                    outcome.artifacts = *states;
                    return Ok(ScrapeResult::Done(outcome));
                }
                FetchStep::Stopped => return Ok(ScrapeResult::Stopped),
            }
        }

        for kind in ArtifactKind::PROCESSING_ORDER {
            metrics::record_artifact(kind, states.get(kind));
        }

        Ok(ScrapeResult::Done(ItemOutcome::aggregated(
            link,
            *states,
            self.config.success_policy,
        )))
    }

    /// Existence check that fails open: a store error reads as "not stored".
    async fn is_stored(&self, key: &ArtifactKey) -> bool {
        match self.store.exists(key).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(key = %key, "Existence check failed, will fetch: {}", e);
                false
            }
        }
    }

    async fn fetch_artifact(
        &self,
        kind: ArtifactKind,
        url: &str,
        id_tag: &str,
        key: &ArtifactKey,
    ) -> WorkerResult<FetchStep> {
        if self.control.poll() {
            self.tracker
                .log(format!("Scraping stopped while processing {} for {}.", kind, url))
                .await;
            return Ok(FetchStep::Stopped);
        }

        let local = self.config.local_path(kind, id_tag);
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let line = match kind {
            ArtifactKind::Video => format!("Downloading video for {}...", url),
            _ => format!("Fetching {} for {}...", kind, url),
        };
        self.tracker.log(line).await;

        let fetched = self.extractor.fetch(kind, url, &local).await;

        if self.control.poll() {
            remove_local(&local).await;
            self.tracker
                .log(format!("Scraping stopped after processing {} for {}.", kind, url))
                .await;
            return Ok(FetchStep::Stopped);
        }

        match fetched {
            Ok(()) => {}
            Err(MediaError::SourceUnavailable(reason)) if kind == ArtifactKind::Video => {
                remove_local(&local).await;
                return Ok(FetchStep::SourceUnavailable(reason));
            }
            Err(e) => {
                warn!(id_tag = %id_tag, artifact = %kind, "Fetch failed: {}", e);
                remove_local(&local).await;
                self.tracker
                    .log(format!("Failed to fetch {} for {}: {}", kind, url, e))
                    .await;
                return Ok(FetchStep::Stored(ArtifactState::Failed));
            }
        }

        let uploaded = retry_async(&self.upload_retry, || {
            self.store.upload(key, &local, kind.content_type())
        })
        .await;
        remove_local(&local).await;

        match uploaded.into_result() {
            Ok(()) => {
                info!(id_tag = %id_tag, artifact = %kind, key = %key, "Artifact stored");
                self.tracker
                    .log(format!("{} stored for {}.", kind, url))
                    .await;
                Ok(FetchStep::Stored(ArtifactState::Fetched))
            }
            Err(e) => {
                warn!(id_tag = %id_tag, artifact = %kind, key = %key, "Upload failed: {}", e);
                self.tracker
                    .log(format!("Failed to upload {} for {}: {}", kind, url, e))
                    .await;
                Ok(FetchStep::Stored(ArtifactState::Failed))
            }
        }
    }
}

async fn remove_local(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use tempfile::TempDir;
    use vharvest_models::{ItemStatus, SuccessPolicy};

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    struct Fixture {
        _dir: TempDir,
        config: HarvestConfig,
        extractor: Arc<FakeExtractor>,
        store: Arc<CountingStore>,
        control: Arc<ControlFlag>,
        pipeline: ItemPipeline,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let config = HarvestConfig {
            work_dir: dir.path().join("work"),
            stop_marker: dir.path().join("stop"),
            upload_retries: 0,
            ..Default::default()
        };
        let extractor = Arc::new(FakeExtractor::new());
        let store = Arc::new(CountingStore::new());
        let control = Arc::new(ControlFlag::open(&config.stop_marker));
        let pipeline = ItemPipeline::new(
            &config,
            extractor.clone(),
            store.clone(),
            control.clone(),
            Arc::new(ProgressTracker::new()),
        );
        Fixture {
            _dir: dir,
            config,
            extractor,
            store,
            control,
            pipeline,
        }
    }

    fn batch() -> BatchDate {
        BatchDate::from_ymd(2024, 5, 1).unwrap()
    }

    fn done(result: ScrapeResult) -> ItemOutcome {
        match result {
            ScrapeResult::Done(outcome) => outcome,
            ScrapeResult::Stopped => panic!("unexpected stop"),
        }
    }

    #[tokio::test]
    async fn test_fetches_and_uploads_all_artifacts() {
        let f = fixture();
        let outcome = done(f.pipeline.scrape(&LinkRecord::new("T1", URL), batch()).await);

        assert_eq!(outcome.status, ItemStatus::Successful);
        assert_eq!(f.extractor.calls(), 4);
        assert_eq!(f.store.uploads(), 4);
        assert_eq!(f.extractor.fetched()[0].0, ArtifactKind::Video);

        let title = ArtifactKey::new(batch(), "T1", ArtifactKind::Title);
        assert!(f.store.inner.exists(&title).await.unwrap());

        // No local artifact outlives its row.
        for kind in ArtifactKind::PROCESSING_ORDER {
            assert!(!f.config.local_path(kind, "T1").exists());
        }
    }

    #[tokio::test]
    async fn test_unsafe_id_tag_is_invalid_and_touches_nothing() {
        let f = fixture();

        for tag in ["../../outside/evil", "a/b", "a\\b", "", "T1\n"] {
            let outcome = done(f.pipeline.scrape(&LinkRecord::new(tag, URL), batch()).await);
            assert_eq!(outcome.status, ItemStatus::Invalid, "tag {:?}", tag);
        }

        assert_eq!(f.extractor.calls(), 0);
        assert_eq!(f.store.uploads(), 0);
        assert!(f.store.inner.is_empty().await);
        assert!(!f._dir.path().join("outside").exists());
        assert!(!f.config.work_dir.exists());
    }

    #[tokio::test]
    async fn test_fully_stored_item_is_skipped() {
        let f = fixture();
        for kind in ArtifactKind::PROCESSING_ORDER {
            let key = ArtifactKey::new(batch(), "T1", kind);
            f.store.inner.upload_bytes(&key, b"old".to_vec(), "x").await.unwrap();
        }

        let outcome = done(f.pipeline.scrape(&LinkRecord::new("T1", URL), batch()).await);

        assert_eq!(outcome.status, ItemStatus::Successful);
        assert_eq!(outcome.artifacts.video, ArtifactState::Skipped);
        assert_eq!(f.extractor.calls(), 0);
        assert_eq!(f.store.uploads(), 0);
    }

    #[tokio::test]
    async fn test_partially_stored_item_fetches_only_missing() {
        let f = fixture();
        let key = ArtifactKey::new(batch(), "T1", ArtifactKind::Video);
        f.store.inner.upload_bytes(&key, b"v".to_vec(), "video/mp4").await.unwrap();

        let outcome = done(f.pipeline.scrape(&LinkRecord::new("T1", URL), batch()).await);

        assert_eq!(outcome.status, ItemStatus::Successful);
        assert_eq!(f.extractor.calls(), 3);
        assert!(f
            .extractor
            .fetched()
            .iter()
            .all(|(kind, _)| *kind != ArtifactKind::Video));
    }

    #[tokio::test]
    async fn test_invalid_link_never_reaches_extractor() {
        let f = fixture();
        for bad in ["", "https://vimeo.com/1", "http://www.youtube.com/watch?v=dQw4w9WgXcQ"] {
            let outcome = done(f.pipeline.scrape(&LinkRecord::new("T1", bad), batch()).await);
            assert_eq!(outcome.status, ItemStatus::Invalid);
        }
        assert_eq!(f.extractor.calls(), 0);
        assert_eq!(f.store.uploads(), 0);
    }

    #[tokio::test]
    async fn test_short_link_is_canonicalised() {
        let f = fixture();
        let outcome = done(
            f.pipeline
                .scrape(&LinkRecord::new("T1", "https://youtu.be/dQw4w9WgXcQ"), batch())
                .await,
        );
        assert_eq!(outcome.status, ItemStatus::Successful);
        assert!(f.extractor.fetched().iter().all(|(_, url)| url == URL));
    }

    #[tokio::test]
    async fn test_unavailable_video_short_circuits_as_invalid() {
        let f = fixture();
        f.extractor.script(URL, ArtifactKind::Video, Script::Unavailable);

        let outcome = done(f.pipeline.scrape(&LinkRecord::new("T1", URL), batch()).await);

        assert_eq!(outcome.status, ItemStatus::Invalid);
        assert_eq!(f.extractor.calls(), 1);
        assert_eq!(f.store.uploads(), 0);
        assert_eq!(outcome.artifacts.title, ArtifactState::Pending);
    }

    #[tokio::test]
    async fn test_transient_failure_is_unsuccessful_but_continues() {
        let f = fixture();
        f.extractor.script(URL, ArtifactKind::Video, Script::Fail);

        let outcome = done(f.pipeline.scrape(&LinkRecord::new("T1", URL), batch()).await);

        assert_eq!(outcome.status, ItemStatus::Unsuccessful);
        assert_eq!(outcome.artifacts.video, ArtifactState::Failed);
        assert_eq!(outcome.artifacts.title, ArtifactState::Fetched);
        assert_eq!(f.extractor.calls(), 4);
    }

    #[tokio::test]
    async fn test_any_policy_accepts_partial_item() {
        let dir = TempDir::new().unwrap();
        let config = HarvestConfig {
            work_dir: dir.path().join("work"),
            stop_marker: dir.path().join("stop"),
            success_policy: SuccessPolicy::AnyArtifact,
            ..Default::default()
        };
        let extractor = Arc::new(FakeExtractor::new());
        extractor.script(URL, ArtifactKind::Thumbnail, Script::Fail);
        let pipeline = ItemPipeline::new(
            &config,
            extractor,
            Arc::new(CountingStore::new()),
            Arc::new(ControlFlag::open(&config.stop_marker)),
            Arc::new(ProgressTracker::new()),
        );

        let outcome = done(pipeline.scrape(&LinkRecord::new("T1", URL), batch()).await);
        assert_eq!(outcome.status, ItemStatus::Successful);
        assert_eq!(outcome.artifacts.thumbnail, ArtifactState::Failed);
    }

    #[tokio::test]
    async fn test_upload_failure_marks_unsuccessful() {
        let f = fixture();
        f.store.fail_uploads(true);

        let outcome = done(f.pipeline.scrape(&LinkRecord::new("T1", URL), batch()).await);

        assert_eq!(outcome.status, ItemStatus::Unsuccessful);
        assert_eq!(outcome.artifacts.video, ArtifactState::Failed);
        assert!(!f.config.local_path(ArtifactKind::Video, "T1").exists());
    }

    #[tokio::test]
    async fn test_existence_errors_fail_open() {
        let f = fixture();
        f.store.fail_exists(true);

        let outcome = done(f.pipeline.scrape(&LinkRecord::new("T1", URL), batch()).await);

        assert_eq!(outcome.status, ItemStatus::Successful);
        assert_eq!(f.extractor.calls(), 4);
    }

    #[tokio::test]
    async fn test_stop_before_fetch() {
        let f = fixture();
        f.control.signal().await.unwrap();

        let result = f.pipeline.scrape(&LinkRecord::new("T1", URL), batch()).await;
        assert_eq!(result, ScrapeResult::Stopped);
        assert_eq!(f.extractor.calls(), 0);
    }

    #[tokio::test]
    async fn test_stop_mid_item_abandons_remaining_artifacts() {
        let f = fixture();
        f.extractor.stop_after(2, f.control.clone());

        let result = f.pipeline.scrape(&LinkRecord::new("T1", URL), batch()).await;

        assert_eq!(result, ScrapeResult::Stopped);
        assert_eq!(f.extractor.calls(), 2);
        // The video was uploaded before the stop; the title fetched during it was not.
        assert_eq!(f.store.uploads(), 1);
        assert!(!f.config.local_path(ArtifactKind::Title, "T1").exists());
    }
}
