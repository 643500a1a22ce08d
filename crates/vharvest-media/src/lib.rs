//! yt-dlp process wrapper for artifact extraction.
//!
//! This crate provides:
//! - Type-safe yt-dlp command building
//! - A process runner with captured output and an enforced per-call timeout
//! - The `Extractor` seam used by the item pipeline, with a yt-dlp backed
//!   implementation for all four artifact kinds
//! - Detection of sources that can never be fetched
//! - File moves that survive cross-device renames

pub mod command;
pub mod error;
pub mod extract;
pub mod fs_utils;

pub use command::{check_ytdlp, ProcessOutput, ProcessRunner, YtDlpCommand};
pub use error::{MediaError, MediaResult};
pub use extract::{
    filter_title_output, is_unavailable_output, Extractor, ExtractorConfig, YtDlpExtractor,
    VIDEO_FORMAT,
};
pub use fs_utils::{find_produced_file, move_file};
