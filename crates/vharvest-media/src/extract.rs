//! Artifact extraction through yt-dlp.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;
use vharvest_models::ArtifactKind;

use crate::command::{ProcessOutput, ProcessRunner, YtDlpCommand, DEFAULT_PROGRAM};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{find_produced_file, move_file};

/// Quality ladder: 1080p mp4 video with m4a audio, then the best muxed mp4.
pub const VIDEO_FORMAT: &str =
    "bestvideo[ext=mp4][height<=1080]+bestaudio[ext=m4a]/best[ext=mp4][height<=1080]/best[ext=mp4]";

/// Output fragments that mean the source will never be playable.
const UNAVAILABLE_MARKERS: &[&str] = &[
    "Video unavailable",
    "This content can't be played",
    "cannot be played",
];

/// Line prefixes yt-dlp mixes into `--print` output.
const NOISE_PREFIXES: &[&str] = &["WARNING:", "ERROR:", "HTTP Error"];

/// Fetches one artifact of one source into a local file.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Fetch `kind` for the watch URL `url` and leave the result at `dest`.
    ///
    /// Returns `MediaError::SourceUnavailable` when the source reports itself
    /// as unplayable; every other error is transient.
    async fn fetch(&self, kind: ArtifactKind, url: &str, dest: &Path) -> MediaResult<()>;
}

/// Settings shared by every yt-dlp invocation.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Program name or path
    pub program: String,
    /// Browser to pull cookies from (`--cookies-from-browser`)
    pub cookies_from_browser: Option<String>,
    /// Netscape cookie file (`--cookies`)
    pub cookies_file: Option<PathBuf>,
    /// Scratch directory for sidecar files
    pub scratch_dir: PathBuf,
    pub video_timeout: Duration,
    pub metadata_timeout: Duration,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            cookies_from_browser: None,
            cookies_file: None,
            scratch_dir: std::env::temp_dir().join("vharvest"),
            video_timeout: Duration::from_secs(1800),
            metadata_timeout: Duration::from_secs(120),
        }
    }
}

/// [`Extractor`] backed by the yt-dlp binary.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    config: ExtractorConfig,
}

impl YtDlpExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Options every call carries: direct connection, no age gate, cookies.
    fn base_command(&self, url: &str) -> YtDlpCommand {
        let mut cmd = YtDlpCommand::new(&self.config.program, url)
            .proxy("")
            .age_limit(99)
            .no_progress();

        if let Some(browser) = &self.config.cookies_from_browser {
            cmd = cmd.cookies_from_browser(browser);
        }
        if let Some(file) = &self.config.cookies_file {
            if file.exists() {
                cmd = cmd.cookies_file(file);
            } else {
                warn!("Cookies file not found: {}", file.display());
            }
        }
        cmd
    }

    async fn run(&self, cmd: &YtDlpCommand, timeout: Duration) -> MediaResult<ProcessOutput> {
        let output = ProcessRunner::new().with_timeout(timeout).run(cmd).await?;
        debug!(exit_code = ?output.exit_code, "yt-dlp finished");

        // Only diagnostics count: stdout carries `--print` payloads such as titles.
        if is_unavailable_output(&output.stderr) {
            return Err(MediaError::SourceUnavailable(
                output.last_error_line().to_string(),
            ));
        }
        if !output.success {
            debug!("yt-dlp output:\n{}", output.combined());
            return Err(MediaError::extraction_failed(
                output.last_error_line(),
                output.exit_code,
            ));
        }
        Ok(output)
    }

    async fn fetch_video(&self, url: &str, dest: &Path) -> MediaResult<()> {
        ensure_parent(dest).await?;

        let cmd = self
            .base_command(url)
            .format(VIDEO_FORMAT)
            .merge_output_format("mp4")
            .output(dest.to_string_lossy().to_string());

        info!("Downloading video: {}", url);
        self.run(&cmd, self.config.video_timeout).await?;

        if !dest.exists() {
            return Err(MediaError::FileNotFound(dest.to_path_buf()));
        }
        Ok(())
    }

    async fn fetch_title(&self, url: &str, dest: &Path) -> MediaResult<()> {
        let cmd = self.base_command(url).print("title");
        let output = self.run(&cmd, self.config.metadata_timeout).await?;

        let title = filter_title_output(&output.stdout);
        if title.is_empty() {
            return Err(MediaError::EmptyOutput(format!("no title for {}", url)));
        }

        ensure_parent(dest).await?;
        fs::write(dest, title).await?;
        Ok(())
    }

    /// Description and thumbnail: yt-dlp writes a sidecar whose extension it
    /// chooses, found afterwards by its unique stem.
    async fn fetch_sidecar(&self, kind: ArtifactKind, url: &str, dest: &Path) -> MediaResult<()> {
        fs::create_dir_all(&self.config.scratch_dir).await?;

        let stem = format!("{}-{}", kind.as_str(), Uuid::new_v4());
        let template = self.config.scratch_dir.join(&stem);
        let template = template.to_string_lossy();

        let cmd = match kind {
            ArtifactKind::Description => self
                .base_command(url)
                .write_description()
                .skip_download()
                .output(format!("{}.description", template)),
            _ => self
                .base_command(url)
                .write_thumbnail()
                .skip_download()
                .output(format!("{}.%(ext)s", template)),
        };

        self.run(&cmd, self.config.metadata_timeout).await?;

        let produced = find_produced_file(&self.config.scratch_dir, &stem).await?;
        move_file(&produced, dest).await
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    async fn fetch(&self, kind: ArtifactKind, url: &str, dest: &Path) -> MediaResult<()> {
        match kind {
            ArtifactKind::Video => self.fetch_video(url, dest).await,
            ArtifactKind::Title => self.fetch_title(url, dest).await,
            ArtifactKind::Description | ArtifactKind::Thumbnail => {
                self.fetch_sidecar(kind, url, dest).await
            }
        }
    }
}

async fn ensure_parent(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    Ok(())
}

/// Whether process output carries an explicit "source unavailable" signal.
pub fn is_unavailable_output(output: &str) -> bool {
    UNAVAILABLE_MARKERS.iter().any(|m| output.contains(m))
}

/// Drop warning/error lines from `--print title` output and trim the rest.
pub fn filter_title_output(stdout: &str) -> String {
    stdout
        .lines()
        .filter(|line| {
            let line = line.trim_start();
            !NOISE_PREFIXES.iter().any(|p| line.starts_with(p))
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_markers() {
        assert!(is_unavailable_output(
            "ERROR: [youtube] abc: Video unavailable. This video is private"
        ));
        assert!(is_unavailable_output(
            "ERROR: This content can't be played on your mobile browser"
        ));
        assert!(is_unavailable_output("the video cannot be played here"));
        assert!(!is_unavailable_output("ERROR: HTTP Error 503: Service Unavailable"));
        assert!(!is_unavailable_output(""));
    }

    #[test]
    fn test_title_filtering() {
        let raw = "WARNING: [youtube] falling back\nMy Great Trailer\nERROR: something\n";
        assert_eq!(filter_title_output(raw), "My Great Trailer");

        assert_eq!(filter_title_output("HTTP Error 429: Too Many Requests\n"), "");
        assert_eq!(filter_title_output("   \n"), "");
    }

    #[test]
    fn test_base_command_options() {
        let extractor = YtDlpExtractor::new(ExtractorConfig {
            cookies_from_browser: Some("chrome".to_string()),
            ..Default::default()
        });
        let args = extractor
            .base_command("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .build_args();

        assert_eq!(&args[..2], &["--proxy".to_string(), String::new()]);
        assert!(args.windows(2).any(|w| w[0] == "--age-limit" && w[1] == "99"));
        assert!(args.contains(&"--no-progress".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "--cookies-from-browser" && w[1] == "chrome"));
        assert_eq!(
            args.last().map(String::as_str),
            Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        );
    }

    #[test]
    fn test_missing_cookies_file_is_skipped() {
        let extractor = YtDlpExtractor::new(ExtractorConfig {
            cookies_file: Some(PathBuf::from("/nonexistent/cookies.txt")),
            ..Default::default()
        });
        let args = extractor.base_command("u").build_args();
        assert!(!args.contains(&"--cookies".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unavailable_output_maps_to_terminal_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("fake-ytdlp");
        std::fs::write(
            &script,
            "#!/bin/sh\necho 'ERROR: [youtube] x: Video unavailable' 1>&2\nexit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let extractor = YtDlpExtractor::new(ExtractorConfig {
            program: script.to_string_lossy().to_string(),
            scratch_dir: dir.path().join("scratch"),
            ..Default::default()
        });

        let result = extractor
            .fetch(
                ArtifactKind::Video,
                "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
                &dir.path().join("v.mp4"),
            )
            .await;
        assert!(matches!(result, Err(MediaError::SourceUnavailable(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_title_written_to_destination() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("fake-ytdlp");
        std::fs::write(&script, "#!/bin/sh\necho 'WARNING: slow'\necho 'Trailer One'\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let extractor = YtDlpExtractor::new(ExtractorConfig {
            program: script.to_string_lossy().to_string(),
            scratch_dir: dir.path().join("scratch"),
            ..Default::default()
        });

        let dest = dir.path().join("Video_Title").join("T1-Title.txt");
        extractor
            .fetch(ArtifactKind::Title, "https://www.youtube.com/watch?v=dQw4w9WgXcQ", &dest)
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "Trailer One");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_title_mentioning_unavailable_is_kept() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("fake-ytdlp");
        std::fs::write(
            &script,
            "#!/bin/sh
echo 'Why This Video cannot be played / Video unavailable: The Movie (2024) Trailer'
",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let extractor = YtDlpExtractor::new(ExtractorConfig {
            program: script.to_string_lossy().to_string(),
            scratch_dir: dir.path().join("scratch"),
            ..Default::default()
        });

        let dest = dir.path().join("Video_Title").join("T1-Title.txt");
        let result = extractor
            .fetch(ArtifactKind::Title, "https://www.youtube.com/watch?v=dQw4w9WgXcQ", &dest)
            .await;
        assert!(result.is_ok(), "unexpected {:?}", result);
        assert_eq!(
            std::fs::read_to_string(&dest).unwrap(),
            "Why This Video cannot be played / Video unavailable: The Movie (2024) Trailer"
        );
    }
}
