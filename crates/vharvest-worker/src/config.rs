//! Worker configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use vharvest_media::ExtractorConfig;
use vharvest_models::{ArtifactKind, SuccessPolicy};

/// Harvest worker configuration.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Scratch directory for per-item files; wiped by reset
    pub work_dir: PathBuf,
    /// Retry ledger location (kept outside `work_dir`)
    pub ledger_path: PathBuf,
    /// Marker file backing the stop flag
    pub stop_marker: PathBuf,
    /// Timeout for one video download
    pub video_timeout: Duration,
    /// Timeout for one title/description/thumbnail call
    pub metadata_timeout: Duration,
    /// Upload retries after the first attempt
    pub upload_retries: u32,
    pub success_policy: SuccessPolicy,
    /// yt-dlp program name or path
    pub ytdlp_path: String,
    pub cookies_from_browser: Option<String>,
    pub cookies_file: Option<PathBuf>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        let work_dir = PathBuf::from("/tmp/vharvest");
        Self {
            ledger_path: default_ledger_path(&work_dir),
            work_dir,
            stop_marker: PathBuf::from("/tmp/vharvest-stop"),
            video_timeout: Duration::from_secs(1800), // 30 minutes
            metadata_timeout: Duration::from_secs(120),
            upload_retries: 2,
            success_policy: SuccessPolicy::AllArtifacts,
            ytdlp_path: "yt-dlp".to_string(),
            cookies_from_browser: None,
            cookies_file: None,
        }
    }
}

impl HarvestConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let work_dir = std::env::var("HARVEST_WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.work_dir);

        Self {
            ledger_path: std::env::var("HARVEST_LEDGER_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_ledger_path(&work_dir)),
            stop_marker: std::env::var("HARVEST_STOP_MARKER")
                .map(PathBuf::from)
                .unwrap_or(defaults.stop_marker),
            video_timeout: Duration::from_secs(
                std::env::var("HARVEST_VIDEO_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1800),
            ),
            metadata_timeout: Duration::from_secs(
                std::env::var("HARVEST_METADATA_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            upload_retries: std::env::var("HARVEST_UPLOAD_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            success_policy: std::env::var("HARVEST_SUCCESS_POLICY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
            cookies_from_browser: non_empty_var("YTDLP_COOKIES_FROM_BROWSER"),
            cookies_file: non_empty_var("YTDLP_COOKIES_FILE").map(PathBuf::from),
            work_dir,
        }
    }

    /// Local path an artifact is written to before upload.
    pub fn local_path(&self, kind: ArtifactKind, id_tag: &str) -> PathBuf {
        self.work_dir.join(kind.folder()).join(kind.file_name(id_tag))
    }

    /// Extractor settings derived from this config.
    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            program: self.ytdlp_path.clone(),
            cookies_from_browser: self.cookies_from_browser.clone(),
            cookies_file: self.cookies_file.clone(),
            scratch_dir: self.work_dir.join("scratch"),
            video_timeout: self.video_timeout,
            metadata_timeout: self.metadata_timeout,
        }
    }
}

/// `<parent of work_dir>/vharvest-ledger.csv`, so reset never deletes it.
fn default_ledger_path(work_dir: &Path) -> PathBuf {
    work_dir
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("vharvest-ledger.csv")
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}
