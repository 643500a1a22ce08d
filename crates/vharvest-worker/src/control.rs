//! Stop flag shared between the API, the driver and other processes.
//!
//! The flag has two halves: a `CancellationToken` observed in-process, and a
//! marker file so an operator (or another process) can stop a batch and the
//! request survives a restart. Either half being set means "stop".

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::WorkerResult;

#[derive(Debug)]
pub struct ControlFlag {
    marker: PathBuf,
    token: Mutex<CancellationToken>,
}

impl ControlFlag {
    /// Open the flag backed by `marker`. An existing marker means a stop
    /// requested before this process started is still in force.
    pub fn open(marker: impl Into<PathBuf>) -> Self {
        let marker = marker.into();
        let token = CancellationToken::new();
        if marker.exists() {
            token.cancel();
        }
        Self {
            marker,
            token: Mutex::new(token),
        }
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker
    }

    fn current_token(&self) -> CancellationToken {
        self.token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Whether a stop was requested.
    pub fn poll(&self) -> bool {
        let token = self.current_token();
        if token.is_cancelled() {
            return true;
        }
        if self.marker.exists() {
            // Set from outside the process; wake in-process waiters too.
            token.cancel();
            return true;
        }
        false
    }

    /// Token for the current generation. Cancelled on `signal`; replaced on `clear`.
    pub fn token(&self) -> CancellationToken {
        self.current_token()
    }

    /// Request a stop.
    pub async fn signal(&self) -> WorkerResult<()> {
        if let Some(parent) = self.marker.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.marker, b"stopped\n").await?;
        self.current_token().cancel();
        info!(marker = %self.marker.display(), "Stop requested");
        Ok(())
    }

    /// Withdraw a stop request.
    pub async fn clear(&self) -> WorkerResult<()> {
        match tokio::fs::remove_file(&self.marker).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        *self
            .token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = CancellationToken::new();
        Ok(())
    }
}
