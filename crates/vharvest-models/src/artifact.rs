//! Artifact kinds, batch dates and deterministic storage keys.
//!
//! The remote layout is one namespace per processing date with four
//! sub-namespaces, each object keyed by row identifier:
//!
//! ```text
//! 2024-05-01-Batch/Video_Title/<idTag>-Title.txt
//! 2024-05-01-Batch/Video_Description/<idTag>-Description.txt
//! 2024-05-01-Batch/Thumbnail_Image/<idTag>-Image.jpg
//! 2024-05-01-Batch/Video/<idTag>-Video.mp4
//! ```
//!
//! Resumption relies on this layout: the same inputs always produce the same
//! key, so an existence check tells whether a previous run already stored it.

use std::fmt;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// One of the four artifacts harvested per link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Title,
    Description,
    Thumbnail,
    Video,
}

impl ArtifactKind {
    /// All kinds in processing order. The video comes first so an unavailable
    /// source is detected before any metadata is fetched.
    pub const PROCESSING_ORDER: [ArtifactKind; 4] = [
        ArtifactKind::Video,
        ArtifactKind::Title,
        ArtifactKind::Description,
        ArtifactKind::Thumbnail,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Title => "title",
            ArtifactKind::Description => "description",
            ArtifactKind::Thumbnail => "thumbnail",
            ArtifactKind::Video => "video",
        }
    }

    /// Sub-namespace inside a batch.
    pub fn folder(&self) -> &'static str {
        match self {
            ArtifactKind::Title => "Video_Title",
            ArtifactKind::Description => "Video_Description",
            ArtifactKind::Thumbnail => "Thumbnail_Image",
            ArtifactKind::Video => "Video",
        }
    }

    /// Object name suffix, including extension.
    pub fn file_suffix(&self) -> &'static str {
        match self {
            ArtifactKind::Title => "Title.txt",
            ArtifactKind::Description => "Description.txt",
            ArtifactKind::Thumbnail => "Image.jpg",
            ArtifactKind::Video => "Video.mp4",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactKind::Title | ArtifactKind::Description => "text/plain; charset=utf-8",
            ArtifactKind::Thumbnail => "image/jpeg",
            ArtifactKind::Video => "video/mp4",
        }
    }

    /// File name used both remotely and for the local temp copy.
    pub fn file_name(&self, id_tag: &str) -> String {
        format!("{}-{}", id_tag, self.file_suffix())
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Calendar date a batch is grouped under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchDate(pub NaiveDate);

impl BatchDate {
    /// Today's date in local time, matching how operators name batches.
    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// Top-level namespace, e.g. `2024-05-01-Batch`.
    pub fn namespace(&self) -> String {
        format!("{}-Batch", self.0.format("%Y-%m-%d"))
    }
}

impl fmt::Display for BatchDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Deterministic remote key for one artifact of one row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    pub fn new(batch: BatchDate, id_tag: &str, kind: ArtifactKind) -> Self {
        Self(format!(
            "{}/{}/{}",
            batch.namespace(),
            kind.folder(),
            kind.file_name(id_tag)
        ))
    }

    /// Wrap an already-built key, e.g. one read back from a listing.
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ArtifactKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Per-artifact state within one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactState {
    /// Not attempted (invalid link, unavailable source, or stop requested)
    #[default]
    Pending,
    /// Already present in the store, nothing fetched
    Skipped,
    /// Fetched and uploaded in this run
    Fetched,
    /// Fetch or upload failed
    Failed,
}

impl ArtifactState {
    /// Skipped and Fetched both mean the artifact is stored.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, ArtifactState::Skipped | ArtifactState::Fetched)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactState::Pending => "pending",
            ArtifactState::Skipped => "skipped",
            ArtifactState::Fetched => "fetched",
            ArtifactState::Failed => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> BatchDate {
        BatchDate::from_ymd(2024, 5, 1).unwrap()
    }

    #[test]
    fn test_key_layout() {
        let b = batch();
        assert_eq!(
            ArtifactKey::new(b, "T1", ArtifactKind::Title).as_str(),
            "2024-05-01-Batch/Video_Title/T1-Title.txt"
        );
        assert_eq!(
            ArtifactKey::new(b, "T1", ArtifactKind::Description).as_str(),
            "2024-05-01-Batch/Video_Description/T1-Description.txt"
        );
        assert_eq!(
            ArtifactKey::new(b, "T1", ArtifactKind::Thumbnail).as_str(),
            "2024-05-01-Batch/Thumbnail_Image/T1-Image.jpg"
        );
        assert_eq!(
            ArtifactKey::new(b, "T1", ArtifactKind::Video).as_str(),
            "2024-05-01-Batch/Video/T1-Video.mp4"
        );
    }

    #[test]
    fn test_key_is_deterministic() {
        let a = ArtifactKey::new(batch(), "X9", ArtifactKind::Video);
        let b = ArtifactKey::new(batch(), "X9", ArtifactKind::Video);
        assert_eq!(a, b);

        let other_day = BatchDate::from_ymd(2024, 5, 2).unwrap();
        assert_ne!(a, ArtifactKey::new(other_day, "X9", ArtifactKind::Video));
    }

    #[test]
    fn test_video_processed_first() {
        assert_eq!(ArtifactKind::PROCESSING_ORDER[0], ArtifactKind::Video);
    }

    #[test]
    fn test_satisfied_states() {
        assert!(ArtifactState::Skipped.is_satisfied());
        assert!(ArtifactState::Fetched.is_satisfied());
        assert!(!ArtifactState::Failed.is_satisfied());
        assert!(!ArtifactState::Pending.is_satisfied());
    }
}
