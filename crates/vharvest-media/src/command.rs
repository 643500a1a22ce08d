//! yt-dlp command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Default program name looked up on PATH.
pub const DEFAULT_PROGRAM: &str = "yt-dlp";

/// Builder for yt-dlp commands.
#[derive(Debug, Clone)]
pub struct YtDlpCommand {
    /// Program to execute
    program: String,
    /// Source URL, always passed last
    url: String,
    /// Option arguments
    args: Vec<String>,
}

impl YtDlpCommand {
    /// Create a new command for `url`.
    pub fn new(program: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            url: url.into(),
            args: Vec::new(),
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Route requests through `proxy`; an empty string forces a direct connection.
    pub fn proxy(self, proxy: impl Into<String>) -> Self {
        self.arg("--proxy").arg(proxy)
    }

    pub fn age_limit(self, years: u32) -> Self {
        self.arg("--age-limit").arg(years.to_string())
    }

    pub fn cookies_from_browser(self, browser: impl Into<String>) -> Self {
        self.arg("--cookies-from-browser").arg(browser)
    }

    pub fn cookies_file(self, path: impl AsRef<Path>) -> Self {
        self.arg("--cookies")
            .arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn no_progress(self) -> Self {
        self.arg("--no-progress")
    }

    /// Format selector (`-f`).
    pub fn format(self, selector: impl Into<String>) -> Self {
        self.arg("-f").arg(selector)
    }

    pub fn merge_output_format(self, container: impl Into<String>) -> Self {
        self.arg("--merge-output-format").arg(container)
    }

    /// Output template (`-o`).
    pub fn output(self, template: impl Into<String>) -> Self {
        self.arg("-o").arg(template)
    }

    /// Print a single field to stdout instead of downloading.
    pub fn print(self, field: impl Into<String>) -> Self {
        self.arg("--print").arg(field)
    }

    pub fn write_description(self) -> Self {
        self.arg("--write-description")
    }

    pub fn write_thumbnail(self) -> Self {
        self.arg("--write-thumbnail")
    }

    pub fn skip_download(self) -> Self {
        self.arg("--skip-download")
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Build the argument list (URL last).
    pub fn build_args(&self) -> Vec<String> {
        let mut args = self.args.clone();
        args.push(self.url.clone());
        args
    }
}

/// Captured result of one process invocation.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// Stdout followed by stderr, for diagnostics and signal detection.
    pub fn combined(&self) -> String {
        let mut out = String::with_capacity(self.stdout.len() + self.stderr.len() + 1);
        out.push_str(&self.stdout);
        if !self.stdout.is_empty() && !self.stdout.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&self.stderr);
        out
    }

    /// Last non-empty stderr line, used as a short error message.
    pub fn last_error_line(&self) -> &str {
        self.stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("Unknown error")
    }
}

/// Runner for yt-dlp commands with an enforced timeout.
///
/// A non-zero exit is not an error here: callers inspect the captured output
/// to tell an unavailable source from a transient failure.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self { timeout: None }
    }

    /// Set timeout. The child is killed when it expires.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run a command to completion and capture its output.
    pub async fn run(&self, cmd: &YtDlpCommand) -> MediaResult<ProcessOutput> {
        which::which(cmd.program())
            .map_err(|_| MediaError::YtDlpNotFound(cmd.program().to_string()))?;

        let args = cmd.build_args();
        debug!("Running: {} {}", cmd.program(), args.join(" "));

        let child = Command::new(cmd.program())
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, child.wait_with_output()).await {
                Ok(result) => result?,
                Err(_) => {
                    // Dropping the wait future drops the child, which kills it.
                    warn!(
                        "{} timed out after {:?}, killed process",
                        cmd.program(),
                        timeout
                    );
                    return Err(MediaError::Timeout(timeout.as_secs()));
                }
            },
            None => child.wait_with_output().await?,
        };

        Ok(ProcessOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Check if yt-dlp (or the configured program) is available.
pub fn check_ytdlp(program: &str) -> MediaResult<PathBuf> {
    which::which(program).map_err(|_| MediaError::YtDlpNotFound(program.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder_puts_url_last() {
        let cmd = YtDlpCommand::new(DEFAULT_PROGRAM, "https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .proxy("")
            .age_limit(99)
            .print("title");

        let args = cmd.build_args();
        assert_eq!(
            args,
            vec![
                "--proxy",
                "",
                "--age-limit",
                "99",
                "--print",
                "title",
                "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            ]
        );
    }

    #[test]
    fn test_combined_output() {
        let out = ProcessOutput {
            success: false,
            exit_code: Some(1),
            stdout: "line one".to_string(),
            stderr: "ERROR: Video unavailable\n".to_string(),
        };
        assert_eq!(out.combined(), "line one\nERROR: Video unavailable\n");
        assert_eq!(out.last_error_line(), "ERROR: Video unavailable");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runner_captures_output_and_status() {
        // `sh -c <script> <url>`: the URL lands in $0 and is ignored.
        let cmd = YtDlpCommand::new("sh", "ignored")
            .arg("-c")
            .arg("echo out; echo err 1>&2; exit 3");

        let output = ProcessRunner::new().run(&cmd).await.unwrap();
        assert!(!output.success);
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runner_enforces_timeout() {
        let cmd = YtDlpCommand::new("sh", "ignored").arg("-c").arg("sleep 5");

        let result = ProcessRunner::new()
            .with_timeout(Duration::from_millis(100))
            .run(&cmd)
            .await;
        assert!(matches!(result, Err(MediaError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_runner_reports_missing_program() {
        let cmd = YtDlpCommand::new("definitely-not-a-real-binary-vharvest", "url");
        let result = ProcessRunner::new().run(&cmd).await;
        assert!(matches!(result, Err(MediaError::YtDlpNotFound(_))));
    }
}
