//! Retry ledger persisted as CSV.
//!
//! One row per processed input row: `idTag,YoutubeLink,success,failure`.
//! Rows a stopped run never reached are not written.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use vharvest_models::{ItemOutcome, LedgerRow, LinkRecord};

use crate::error::{WorkerError, WorkerResult};

#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all rows. A missing ledger reads as empty.
    pub async fn read(&self) -> WorkerResult<Vec<LedgerRow>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_rows(&path))
            .await
            .map_err(|e| WorkerError::internal(format!("ledger read task failed: {}", e)))?
    }

    /// Replace the ledger with `rows`.
    pub async fn write(&self, rows: Vec<LedgerRow>) -> WorkerResult<()> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_rows(&path, &rows))
            .await
            .map_err(|e| WorkerError::internal(format!("ledger write task failed: {}", e)))?
    }
}

fn read_rows(path: &Path) -> WorkerResult<Vec<LedgerRow>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader
        .deserialize::<LedgerRow>()
        .collect::<Result<Vec<_>, _>>()?;
    debug!("Read {} ledger rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Write to a sibling temp file, then rename over the ledger.
fn write_rows(path: &Path, rows: &[LedgerRow]) -> WorkerResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let staged = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&staged)?;
        if rows.is_empty() {
            writer.write_record(["idTag", "YoutubeLink", "success", "failure"])?;
        }
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
    }
    std::fs::rename(&staged, path)?;
    debug!("Wrote {} ledger rows to {}", rows.len(), path.display());
    Ok(())
}

/// Ledger rows for the outcomes of a fresh run.
pub fn rows_for(outcomes: &[ItemOutcome]) -> Vec<LedgerRow> {
    outcomes.iter().map(LedgerRow::from).collect()
}

/// Rows a retry should reprocess, in ledger order.
pub fn failed_links(rows: &[LedgerRow]) -> Vec<LinkRecord> {
    rows.iter()
        .filter(|r| r.is_failed())
        .map(LedgerRow::to_link)
        .collect()
}

/// Fold a retry's outcomes into the previous ledger.
///
/// `outcomes` must come from a run over `failed_links(previous)`: the n-th
/// outcome belongs to the n-th failed row. Pairing by position keeps rows
/// that share an `idTag` apart. Every other row (earlier successes, and
/// failures the retry never reached) is carried unchanged.
pub fn merge(previous: &[LedgerRow], outcomes: &[ItemOutcome]) -> Vec<LedgerRow> {
    let mut reprocessed = outcomes.iter();

    previous
        .iter()
        .map(|row| {
            if !row.is_failed() {
                return row.clone();
            }
            match reprocessed.next() {
                Some(outcome) if outcome.id_tag == row.id_tag => LedgerRow::from(outcome),
                Some(outcome) => {
                    warn!(
                        expected = %row.id_tag,
                        got = %outcome.id_tag,
                        "Retry outcome out of ledger order, keeping the old row"
                    );
                    row.clone()
                }
                None => row.clone(),
            }
        })
        .collect()
}
