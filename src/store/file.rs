//! JSON-file backed item store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::error::StoreError;
use super::types::{ItemId, StoreSnapshot, TrackedItem};

/// In-memory tracked-item mapping plus the file it is persisted to.
///
/// Every mutating method persists before returning and restores the previous
/// in-memory state if the write fails, so memory never runs ahead of disk.
#[derive(Debug)]
pub struct ItemStore {
    path: PathBuf,
    items: StoreSnapshot,
}

impl ItemStore {
    /// Load the store from `path`.
    ///
    /// A missing or empty file yields an empty store. A malformed file also
    /// yields an empty store, after being moved aside to `<name>.corrupt` so
    /// the next persist does not overwrite it. Any other read error is
    /// returned: the file may be fine, and writing over it would lose it.
    pub async fn load(path: &Path) -> Result<Self, StoreError> {
        let items = match fs::read(path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => {
                tracing::info!("Store file {} is empty, starting fresh", path.display());
                StoreSnapshot::new()
            }
            Ok(bytes) => match serde_json::from_slice::<StoreSnapshot>(&bytes) {
                Ok(items) => {
                    tracing::debug!(
                        count = items.len(),
                        "Loaded tracked items from {}",
                        path.display()
                    );
                    items
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Unable to load tracked items from {}, starting with none",
                        path.display()
                    );
                    quarantine(path).await;
                    StoreSnapshot::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("No store file at {}, starting fresh", path.display());
                StoreSnapshot::new()
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            items,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Tracked IDs in insertion order.
    pub fn list(&self) -> Vec<ItemId> {
        self.items.ids()
    }

    pub fn items(&self) -> Vec<TrackedItem> {
        self.items.iter().collect()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.items.clone()
    }

    /// Start tracking `ids` with an unset marker. Already-tracked IDs are
    /// left alone. Returns the number of newly tracked IDs.
    pub async fn add(&mut self, ids: &[ItemId]) -> Result<usize, StoreError> {
        let mut next = self.items.clone();
        let added = ids.iter().filter(|id| next.insert_unset(**id)).count();
        if added > 0 {
            self.replace_and_persist(next).await?;
        }
        Ok(added)
    }

    /// Stop tracking `ids`. Returns the number of IDs that were tracked.
    /// Nothing is written when none of them were.
    pub async fn remove(&mut self, ids: &[ItemId]) -> Result<usize, StoreError> {
        let mut next = self.items.clone();
        let removed = ids.iter().filter(|id| next.remove(**id)).count();
        if removed > 0 {
            self.replace_and_persist(next).await?;
        }
        Ok(removed)
    }

    /// Persist `next` and adopt it as the in-memory state once it is on disk.
    pub async fn replace_and_persist(&mut self, next: StoreSnapshot) -> Result<(), StoreError> {
        write_atomic(&self.path, &next).await?;
        self.items = next;
        Ok(())
    }

    /// Write the current state to disk.
    pub async fn persist(&self) -> Result<(), StoreError> {
        write_atomic(&self.path, &self.items).await
    }
}

/// Sibling path used for the in-progress write, e.g. `items.json.tmp`.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `snapshot` to a temp file, fsync it, then rename it over `path`.
/// Readers see either the old file or the new one, never a torn write.
async fn write_atomic(path: &Path, snapshot: &StoreSnapshot) -> Result<(), StoreError> {
    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_vec(snapshot)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp = temp_path(path);
    let result = async {
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, path).await
    }
    .await;

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp).await;
        return Err(write_err(e));
    }

    tracing::debug!(count = snapshot.len(), "Persisted store to {}", path.display());
    Ok(())
}

/// Move an unparseable store file out of the way, best effort.
async fn quarantine(path: &Path) {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".corrupt");
    let target = path.with_file_name(name);
    match fs::rename(path, &target).await {
        Ok(()) => tracing::warn!("Moved unreadable store file to {}", target.display()),
        Err(e) => tracing::debug!(error = %e, "Could not move aside {}", path.display()),
    }
}
