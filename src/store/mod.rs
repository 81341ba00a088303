//! Durable record of tracked Workshop items.
//!
//! The store maps each tracked item ID to the last update marker observed
//! for it. It is kept in memory, persisted to a flat JSON object after every
//! mutation, and written via temp-file-then-rename so an interrupted write
//! never leaves a truncated file behind.

pub mod error;
pub mod file;
pub mod ids;
pub mod lock;
pub mod types;

pub use error::StoreError;
pub use file::ItemStore;
pub use ids::parse_id_list;
pub use lock::StoreLock;
pub use types::{ItemId, Marker, StoreSnapshot, TrackedItem};
