//! Retry ledger rows.

use serde::{Deserialize, Serialize};

use crate::link::LinkRecord;
use crate::outcome::{ItemOutcome, ItemStatus};

/// One processed row and whether it succeeded.
///
/// Invalid rows are recorded with both bits cleared: they are neither a
/// success nor a retryable failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    #[serde(rename = "idTag")]
    pub id_tag: String,
    #[serde(rename = "YoutubeLink")]
    pub link: String,
    pub success: u8,
    pub failure: u8,
}

impl LedgerRow {
    pub fn is_failed(&self) -> bool {
        self.failure == 1
    }

    pub fn to_link(&self) -> LinkRecord {
        LinkRecord::new(self.id_tag.clone(), self.link.clone())
    }
}

impl From<&ItemOutcome> for LedgerRow {
    fn from(outcome: &ItemOutcome) -> Self {
        let (success, failure) = match outcome.status {
            ItemStatus::Successful => (1, 0),
            ItemStatus::Unsuccessful => (0, 1),
            ItemStatus::Invalid => (0, 0),
        };
        Self {
            id_tag: outcome.id_tag.clone(),
            link: outcome.source_url.clone(),
            success,
            failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::ArtifactStates;

    #[test]
    fn test_bits_follow_status() {
        let link = LinkRecord::new("A", "https://www.youtube.com/watch?v=dQw4w9WgXcQ");

        let failed = ItemOutcome::unsuccessful(&link, ArtifactStates::default(), "boom");
        let row = LedgerRow::from(&failed);
        assert_eq!((row.success, row.failure), (0, 1));
        assert!(row.is_failed());

        let invalid = ItemOutcome::invalid(&link, "unavailable");
        let row = LedgerRow::from(&invalid);
        assert_eq!((row.success, row.failure), (0, 0));
        assert!(!row.is_failed());
    }
}
