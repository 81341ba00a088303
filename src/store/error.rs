//! Error types for the tracked-item store.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by store mutations.
///
/// A missing or corrupt store file is not an error: it is recovered by
/// starting empty.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read store file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Writing or renaming the store file failed. The mutation that caused
    /// the write has been rolled back in memory.
    #[error("Failed to write store file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize store: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to create lock file {path}: {source}")]
    LockFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Another process held the store lock for longer than we were willing
    /// to wait.
    #[error("Timed out waiting for another workshop-watch instance to release {path}")]
    Locked { path: PathBuf },

    #[error("Failed to spawn blocking task: {0}")]
    Spawn(#[from] tokio::task::JoinError),
}
