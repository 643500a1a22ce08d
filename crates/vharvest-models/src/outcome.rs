//! Per-item outcomes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactKind, ArtifactState};
use crate::link::LinkRecord;

/// Overall classification of a processed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Successful,
    /// Eligible for retry
    Unsuccessful,
    /// Bad link or unavailable source; never retried
    Invalid,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Successful => "successful",
            ItemStatus::Unsuccessful => "unsuccessful",
            ItemStatus::Invalid => "invalid",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How per-artifact states aggregate into an item status.
///
/// Earlier revisions of the harvester disagreed on this: some counted an item
/// as successful when any artifact was stored, later ones required all four.
/// `AllArtifacts` is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessPolicy {
    #[default]
    AllArtifacts,
    AnyArtifact,
}

impl FromStr for SuccessPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "all_artifacts" => Ok(SuccessPolicy::AllArtifacts),
            "any" | "any_artifact" => Ok(SuccessPolicy::AnyArtifact),
            other => Err(format!("unknown success policy: {}", other)),
        }
    }
}

/// State of each of the four artifacts for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArtifactStates {
    pub title: ArtifactState,
    pub description: ArtifactState,
    pub thumbnail: ArtifactState,
    pub video: ArtifactState,
}

impl ArtifactStates {
    pub fn get(&self, kind: ArtifactKind) -> ArtifactState {
        match kind {
            ArtifactKind::Title => self.title,
            ArtifactKind::Description => self.description,
            ArtifactKind::Thumbnail => self.thumbnail,
            ArtifactKind::Video => self.video,
        }
    }

    pub fn set(&mut self, kind: ArtifactKind, state: ArtifactState) {
        match kind {
            ArtifactKind::Title => self.title = state,
            ArtifactKind::Description => self.description = state,
            ArtifactKind::Thumbnail => self.thumbnail = state,
            ArtifactKind::Video => self.video = state,
        }
    }

    fn iter(&self) -> impl Iterator<Item = ArtifactState> + '_ {
        ArtifactKind::PROCESSING_ORDER.iter().map(|k| self.get(*k))
    }

    pub fn all_satisfied(&self) -> bool {
        self.iter().all(|s| s.is_satisfied())
    }

    pub fn any_satisfied(&self) -> bool {
        self.iter().any(|s| s.is_satisfied())
    }

    /// Aggregate into Successful/Unsuccessful under the given policy.
    pub fn aggregate(&self, policy: SuccessPolicy) -> ItemStatus {
        let ok = match policy {
            SuccessPolicy::AllArtifacts => self.all_satisfied(),
            SuccessPolicy::AnyArtifact => self.any_satisfied(),
        };
        if ok {
            ItemStatus::Successful
        } else {
            ItemStatus::Unsuccessful
        }
    }
}

/// Result of processing one link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    #[serde(rename = "idTag")]
    pub id_tag: String,
    #[serde(rename = "YoutubeLink")]
    pub source_url: String,
    pub artifacts: ArtifactStates,
    pub status: ItemStatus,
    /// Short reason for Invalid/Unsuccessful items
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ItemOutcome {
    pub fn invalid(link: &LinkRecord, reason: impl Into<String>) -> Self {
        Self {
            id_tag: link.id_tag.clone(),
            source_url: link.source_url.clone(),
            artifacts: ArtifactStates::default(),
            status: ItemStatus::Invalid,
            reason: Some(reason.into()),
        }
    }

    pub fn unsuccessful(link: &LinkRecord, artifacts: ArtifactStates, reason: impl Into<String>) -> Self {
        Self {
            id_tag: link.id_tag.clone(),
            source_url: link.source_url.clone(),
            artifacts,
            status: ItemStatus::Unsuccessful,
            reason: Some(reason.into()),
        }
    }

    /// Build from finished artifact states.
    pub fn aggregated(link: &LinkRecord, artifacts: ArtifactStates, policy: SuccessPolicy) -> Self {
        let status = artifacts.aggregate(policy);
        let reason = match status {
            ItemStatus::Successful => None,
            _ => Some("one or more artifacts failed".to_string()),
        };
        Self {
            id_tag: link.id_tag.clone(),
            source_url: link.source_url.clone(),
            artifacts,
            status,
            reason,
        }
    }

    pub fn is_successful(&self) -> bool {
        self.status == ItemStatus::Successful
    }

    pub fn link(&self) -> LinkRecord {
        LinkRecord::new(self.id_tag.clone(), self.source_url.clone())
    }
}

/// Entry in a progress detail list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    #[serde(rename = "idTag")]
    pub id_tag: String,
    #[serde(rename = "YoutubeLink")]
    pub source_url: String,
    pub artifacts: ArtifactStates,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&ItemOutcome> for ItemSummary {
    fn from(outcome: &ItemOutcome) -> Self {
        Self {
            id_tag: outcome.id_tag.clone(),
            source_url: outcome.source_url.clone(),
            artifacts: outcome.artifacts,
            reason: outcome.reason.clone(),
        }
    }
}

/// Stored artifacts of one successful item, as shown to an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetail {
    #[serde(rename = "idTag")]
    pub id_tag: String,
    #[serde(rename = "YoutubeLink")]
    pub source_url: String,
    pub title: String,
    pub description: String,
    /// Presigned GET URL
    pub thumbnail_url: String,
    /// Presigned GET URL
    pub video_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states(title: ArtifactState, video: ArtifactState) -> ArtifactStates {
        ArtifactStates {
            title,
            description: ArtifactState::Skipped,
            thumbnail: ArtifactState::Fetched,
            video,
        }
    }

    #[test]
    fn test_all_policy_requires_every_artifact() {
        let s = states(ArtifactState::Fetched, ArtifactState::Skipped);
        assert_eq!(s.aggregate(SuccessPolicy::AllArtifacts), ItemStatus::Successful);

        let s = states(ArtifactState::Failed, ArtifactState::Skipped);
        assert_eq!(s.aggregate(SuccessPolicy::AllArtifacts), ItemStatus::Unsuccessful);

        let s = states(ArtifactState::Fetched, ArtifactState::Pending);
        assert_eq!(s.aggregate(SuccessPolicy::AllArtifacts), ItemStatus::Unsuccessful);
    }

    #[test]
    fn test_any_policy() {
        let s = states(ArtifactState::Failed, ArtifactState::Failed);
        assert_eq!(s.aggregate(SuccessPolicy::AnyArtifact), ItemStatus::Successful);

        assert_eq!(
            ArtifactStates::default().aggregate(SuccessPolicy::AnyArtifact),
            ItemStatus::Unsuccessful
        );
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("all".parse::<SuccessPolicy>().unwrap(), SuccessPolicy::AllArtifacts);
        assert_eq!(" ANY ".parse::<SuccessPolicy>().unwrap(), SuccessPolicy::AnyArtifact);
        assert!("most".parse::<SuccessPolicy>().is_err());
    }

    #[test]
    fn test_invalid_outcome_touches_nothing() {
        let link = LinkRecord::new("T1", "not a link");
        let outcome = ItemOutcome::invalid(&link, "bad link");
        assert_eq!(outcome.status, ItemStatus::Invalid);
        assert_eq!(outcome.artifacts, ArtifactStates::default());
    }
}
