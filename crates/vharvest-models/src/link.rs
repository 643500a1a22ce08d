//! Input link records and watch-URL validation.
//!
//! Links arrive from an uploaded table and are treated as untrusted input.
//! Only canonical watch URLs (`https://[www.]youtube.com/watch?v=<11 chars>`)
//! ever reach the extraction process; `youtu.be` short links are rewritten
//! to that form first.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Host of the short-link form.
const SHORT_LINK_HOST: &str = "youtu.be";

/// Prefix identifying a short link in the input table.
const SHORT_LINK_PREFIX: &str = "https://youtu.be/";

static WATCH_URL_RE: OnceLock<Regex> = OnceLock::new();

fn watch_url_re() -> &'static Regex {
    WATCH_URL_RE.get_or_init(|| {
        Regex::new(r"^https://(www\.)?youtube\.com/watch\?v=[A-Za-z0-9_-]{11}$")
            .expect("watch URL pattern is valid")
    })
}

/// One row of the input table.
///
/// `id_tag` must be unique within a batch: it is part of every artifact key,
/// so two rows sharing a tag overwrite each other's stored artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    #[serde(rename = "idTag")]
    pub id_tag: String,
    #[serde(rename = "YoutubeLink")]
    pub source_url: String,
}

impl LinkRecord {
    pub fn new(id_tag: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            id_tag: id_tag.into(),
            source_url: source_url.into(),
        }
    }
}

/// Reasons a link is classified invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("invalid short link: {0}")]
    InvalidShortLink(String),

    #[error("not a watch URL: {0}")]
    NotWatchUrl(String),

    #[error("invalid idTag: {0:?}")]
    InvalidIdTag(String),
}

pub type LinkResult<T> = Result<T, LinkError>;

/// Check a link against the fixed watch-URL pattern.
pub fn is_watch_url(link: &str) -> bool {
    watch_url_re().is_match(link)
}

/// Check that an `idTag` is usable as one path segment and one key segment.
///
/// Tags name local files and remote objects, so separators, `..`, control
/// characters and blank tags are refused.
pub fn validate_id_tag(id_tag: &str) -> LinkResult<()> {
    let unusable = id_tag.trim().is_empty()
        || id_tag.contains(['/', '\\'])
        || id_tag.contains("..")
        || id_tag.chars().any(char::is_control);

    if unusable {
        Err(LinkError::InvalidIdTag(id_tag.to_string()))
    } else {
        Ok(())
    }
}

/// Rewrite short links to the watch form and validate the result.
///
/// Returns the URL that should be handed to the extractor, or the reason the
/// link must be classified invalid.
pub fn canonical_watch_url(raw: &str) -> LinkResult<String> {
    let raw = raw.trim();

    let candidate = if raw.starts_with(SHORT_LINK_PREFIX) {
        expand_short_link(raw)?
    } else {
        raw.to_string()
    };

    if is_watch_url(&candidate) {
        Ok(candidate)
    } else {
        Err(LinkError::NotWatchUrl(raw.to_string()))
    }
}

/// `https://youtu.be/<id>?t=10` -> `https://www.youtube.com/watch?v=<id>`
fn expand_short_link(raw: &str) -> LinkResult<String> {
    let parsed = Url::parse(raw).map_err(|_| LinkError::InvalidShortLink(raw.to_string()))?;

    if parsed.host_str() != Some(SHORT_LINK_HOST) {
        return Err(LinkError::InvalidShortLink(raw.to_string()));
    }

    let video_id = parsed.path().trim_start_matches('/');
    if video_id.is_empty() {
        return Err(LinkError::InvalidShortLink(raw.to_string()));
    }

    Ok(format!("https://www.youtube.com/watch?v={}", video_id))
}
