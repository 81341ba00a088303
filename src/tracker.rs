//! The update-tracking engine and its command surface.
//!
//! A [`Tracker`] serializes every load-modify-persist sequence on its store
//! behind an async mutex (within the process) and the `<store>.lock` file
//! lock (across processes). Each sequence reloads the file, so a running
//! watcher and one-shot `add`/`remove` commands see each other's writes.
//! Neither lock is held while Steam is queried.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::reconcile::reconcile;
use crate::steam::{DetailSource, FetchOutcome};
use crate::store::{parse_id_list, ItemId, ItemStore, StoreError, StoreLock, TrackedItem};

/// Reply to a user command: whether it succeeded and what to tell the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub success: bool,
    pub message: String,
}

impl CommandReply {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// A freshly loaded store, valid while both locks are held.
struct StoreSession<'a> {
    store: ItemStore,
    lock: StoreLock,
    _guard: MutexGuard<'a, ()>,
}

pub struct Tracker {
    path: PathBuf,
    gate: Mutex<()>,
    source: Arc<dyn DetailSource>,
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Tracker {
    /// Open the store at `path`, loading it once to surface read errors
    /// early.
    pub async fn open(path: &Path, source: Arc<dyn DetailSource>) -> Result<Self, StoreError> {
        let tracker = Self {
            path: path.to_path_buf(),
            gate: Mutex::new(()),
            source,
        };
        {
            let session = tracker.begin().await?;
            tracing::debug!(
                count = session.store.len(),
                lock = %session.lock.path().display(),
                "Opened store {}",
                session.store.path().display()
            );
        }
        Ok(tracker)
    }

    /// Take both locks and reload the store from disk.
    async fn begin(&self) -> Result<StoreSession<'_>, StoreError> {
        let guard = self.gate.lock().await;
        let lock = StoreLock::acquire(&self.path).await?;
        let store = ItemStore::load(&self.path).await?;
        Ok(StoreSession {
            store,
            lock,
            _guard: guard,
        })
    }

    /// Start tracking the IDs in `raw` (space-separated digits).
    ///
    /// A malformed token rejects the whole batch without touching the store.
    pub async fn add_tracked(&self, raw: &str) -> CommandReply {
        let ids = match parse_id_list(raw) {
            Ok(ids) => ids,
            Err(e) => {
                tracing::debug!(error = %e, "Rejected add command");
                return CommandReply::failed(e.to_string());
            }
        };

        let added = match self.begin().await {
            Ok(mut session) => session.store.add(&ids).await,
            Err(e) => Err(e),
        };
        match added {
            Ok(0) => CommandReply::ok("All given IDs were already tracked."),
            Ok(added) => {
                tracing::info!(added, "Tracking new Workshop items");
                CommandReply::ok("Workshop IDs added to the list.")
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to save added Workshop IDs");
                CommandReply::failed(format!("Could not save the tracked list: {}", e))
            }
        }
    }

    /// Stop tracking the IDs in `raw`. Fails if none of them were tracked.
    pub async fn remove_tracked(&self, raw: &str) -> CommandReply {
        let ids = match parse_id_list(raw) {
            Ok(ids) => ids,
            Err(e) => {
                tracing::debug!(error = %e, "Rejected remove command");
                return CommandReply::failed(e.to_string());
            }
        };

        let removed = match self.begin().await {
            Ok(mut session) => session.store.remove(&ids).await,
            Err(e) => Err(e),
        };
        match removed {
            Ok(0) => CommandReply::failed("Given IDs were not found in the list."),
            Ok(removed) => {
                tracing::info!(removed, "Stopped tracking Workshop items");
                CommandReply::ok("Workshop IDs removed from the list.")
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to save removal of Workshop IDs");
                CommandReply::failed(format!("Could not save the tracked list: {}", e))
            }
        }
    }

    /// Tracked IDs in the order they were added.
    pub async fn list_tracked(&self) -> Result<Vec<ItemId>, StoreError> {
        Ok(self.begin().await?.store.list())
    }

    /// Tracked IDs with their last seen markers.
    pub async fn tracked_items(&self) -> Result<Vec<TrackedItem>, StoreError> {
        Ok(self.begin().await?.store.items())
    }

    /// Run one reconciliation cycle and return the IDs that changed.
    ///
    /// A failed fetch is not an error: the cycle reports no changes and the
    /// store is written back unchanged. Only a failed load or write is
    /// returned as an error, in which case the file is left as it was.
    pub async fn check_for_updates(&self) -> Result<Vec<ItemId>, StoreError> {
        let requested = self.begin().await?.store.list();
        if requested.is_empty() {
            tracing::debug!("No tracked items, skipping update check");
            return Ok(Vec::new());
        }

        tracing::debug!(count = requested.len(), "Checking Workshop items for updates");
        let outcome = self.source.fetch(&requested).await;

        // Reconcile against the store as it is now: items removed during the
        // fetch stay removed, items added during it stay unset.
        let mut session = self.begin().await?;
        let details = match outcome {
            FetchOutcome::Fetched(details) => details,
            FetchOutcome::Failed { reason } => {
                tracing::warn!(%reason, "Could not fetch Workshop details, skipping this cycle");
                session.store.persist().await?;
                return Ok(Vec::new());
            }
        };

        let result = reconcile(&session.store.snapshot(), &details);
        session.store.replace_and_persist(result.next).await?;

        tracing::info!(
            checked = requested.len(),
            changed = result.changed.len(),
            baselined = result.baselined.len(),
            missing = result.missing.len(),
            "Update check complete"
        );
        Ok(result.changed)
    }
}
