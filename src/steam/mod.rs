//! Steam Workshop detail fetching.
//!
//! One logical fetch per update check: all tracked IDs are sent to
//! `GetPublishedFileDetails`, split into chunks of a bounded size, and the
//! records that come back are matched to IDs by their `publishedfileid`.
//! Network trouble is reported as [`FetchOutcome::Failed`] instead of an
//! error so the caller can treat it as "no data this cycle".

pub mod client;
pub mod error;
pub mod types;

use async_trait::async_trait;

pub use client::{SteamClient, DEFAULT_API_BASE, DEFAULT_BATCH_SIZE, DEFAULT_TIMEOUT};
pub use types::{RemoteDetail, RemoteDetailBatch};

use crate::store::ItemId;

/// Result of one fetch cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// At least one request succeeded. Every requested ID has an entry.
    Fetched(RemoteDetailBatch),
    /// Nothing usable came back; the cycle should report no changes.
    Failed { reason: String },
}

/// Source of remote update markers.
#[async_trait]
pub trait DetailSource: Send + Sync {
    /// Fetch details for `ids`. Must not panic or error; failures are
    /// folded into the outcome.
    async fn fetch(&self, ids: &[ItemId]) -> FetchOutcome;
}
