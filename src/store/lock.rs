//! Cross-process serialization of store access.

use std::path::{Path, PathBuf};
use std::time::Duration;

use fs4::fs_std::FileExt;
use tokio::time::Instant;

use super::error::StoreError;

/// How long to wait for another process to finish its load-modify-persist.
pub const LOCK_WAIT: Duration = Duration::from_secs(10);

const LOCK_POLL: Duration = Duration::from_millis(20);

/// Exclusive advisory lock on `<store>.lock`.
///
/// Held for one load-modify-persist sequence and released when dropped, so
/// a long-running watcher and one-shot commands can share a store.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    _file: std::fs::File,
}

impl StoreLock {
    /// Acquire the lock for the store at `store_path`, waiting up to
    /// [`LOCK_WAIT`] for another holder to let go.
    pub async fn acquire(store_path: &Path) -> Result<Self, StoreError> {
        Self::acquire_within(store_path, LOCK_WAIT).await
    }

    /// Like [`StoreLock::acquire`] with an explicit wait budget.
    pub async fn acquire_within(store_path: &Path, wait: Duration) -> Result<Self, StoreError> {
        let path = lock_path(store_path);
        let file = {
            let path = path.clone();
            tokio::task::spawn_blocking(move || open_lock_file(&path)).await??
        };

        let deadline = Instant::now() + wait;
        loop {
            if file.try_lock_exclusive().is_ok() {
                tracing::trace!("Acquired store lock {}", path.display());
                return Ok(Self { path, _file: file });
            }
            if Instant::now() >= deadline {
                return Err(StoreError::Locked { path });
            }
            tokio::time::sleep(LOCK_POLL).await;
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Open (creating if needed) the lock file and its parent directory.
fn open_lock_file(path: &Path) -> Result<std::fs::File, StoreError> {
    let lock_err = |source| StoreError::LockFile {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(lock_err)?;
    }
    std::fs::File::create(path).map_err(lock_err)
}

fn lock_path(store_path: &Path) -> PathBuf {
    let mut name = store_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    store_path.with_file_name(name)
}
