//! Delivery of update reports.
//!
//! The engine only produces a list of changed IDs; a [`Notifier`] decides
//! where that list goes.

pub mod error;
pub mod webhook;

use async_trait::async_trait;

pub use error::NotifyError;
pub use webhook::WebhookNotifier;

use crate::store::ItemId;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Report `changed`. Callers only invoke this with a non-empty list.
    async fn notify(&self, changed: &[ItemId]) -> Result<(), NotifyError>;
}

/// Writes update reports to the log. Used when no webhook is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, changed: &[ItemId]) -> Result<(), NotifyError> {
        tracing::info!("{}", format_update_message(changed));
        Ok(())
    }
}

pub fn format_update_message(changed: &[ItemId]) -> String {
    let ids: Vec<String> = changed.iter().map(ItemId::to_string).collect();
    format!("Found updates for Workshop IDs: {}", ids.join(", "))
}
