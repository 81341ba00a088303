//! Update detection: compare fetched markers against stored ones.

use crate::steam::{RemoteDetail, RemoteDetailBatch};
use crate::store::{ItemId, Marker, StoreSnapshot};

/// Output of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationResult {
    /// IDs whose marker advanced, in store order.
    pub changed: Vec<ItemId>,
    /// IDs observed for the first time; recorded but not reported.
    pub baselined: Vec<ItemId>,
    /// IDs with no usable detail this cycle; left untouched.
    pub missing: Vec<ItemId>,
    /// Store state to persist. Always contains every ID of the input.
    pub next: StoreSnapshot,
}

/// Reconcile `current` against freshly fetched `details`.
///
/// Per tracked item:
/// - no usable detail: marker kept, not changed;
/// - stored marker unset: the fetched marker becomes the baseline, not changed;
/// - stored marker older than the fetched one: changed, marker advanced;
/// - otherwise: nothing happens, so an equal or older marker never
///   produces a false positive.
///
/// Details for IDs that are not in `current` are ignored.
pub fn reconcile(current: &StoreSnapshot, details: &RemoteDetailBatch) -> ReconciliationResult {
    let mut next = current.clone();
    let mut changed = Vec::new();
    let mut baselined = Vec::new();
    let mut missing = Vec::new();

    for item in current.iter() {
        let latest = match details.get(item.id) {
            Some(RemoteDetail::Updated(latest)) => latest,
            Some(RemoteDetail::Missing(reason)) => {
                tracing::warn!(id = %item.id, %reason, "Error retrieving update date");
                missing.push(item.id);
                continue;
            }
            None => {
                // Tracked after the fetch started; picked up next cycle.
                tracing::debug!(id = %item.id, "No detail fetched for item");
                missing.push(item.id);
                continue;
            }
        };

        match item.marker {
            Marker::Unset => {
                tracing::debug!(id = %item.id, time_updated = latest, "Recorded baseline");
                next.set(item.id, Marker::Seen(latest));
                baselined.push(item.id);
            }
            Marker::Seen(recorded) if recorded < latest => {
                tracing::info!(
                    id = %item.id,
                    previous = recorded,
                    time_updated = latest,
                    "Workshop item updated"
                );
                next.set(item.id, Marker::Seen(latest));
                changed.push(item.id);
            }
            Marker::Seen(recorded) => {
                if recorded > latest {
                    tracing::debug!(
                        id = %item.id,
                        recorded,
                        time_updated = latest,
                        "Remote marker older than recorded, ignoring"
                    );
                }
            }
        }
    }

    ReconciliationResult {
        changed,
        baselined,
        missing,
        next,
    }
}
