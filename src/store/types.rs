//! Types for the tracked-item store.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A Steam Workshop published-file ID. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u64);

impl ItemId {
    /// Wrap a raw ID, rejecting zero.
    pub fn new(raw: u64) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// serde_json writes integer map keys as strings and parses them back, which
// gives the `{"123": ...}` layout of the store file for free.
impl Serialize for ItemId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u64::deserialize(deserializer)?;
        ItemId::new(raw).ok_or_else(|| serde::de::Error::custom("workshop ID must be positive"))
    }
}

/// Last observed update marker for a tracked item.
///
/// `Unset` means the item has never been successfully observed, so the
/// first marker we see for it is a baseline rather than a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Marker {
    #[default]
    Unset,
    /// `time_updated` as reported by Steam (Unix seconds).
    Seen(i64),
}

impl Marker {
    pub fn timestamp(&self) -> Option<i64> {
        match self {
            Marker::Unset => None,
            Marker::Seen(ts) => Some(*ts),
        }
    }
}

/// On disk `Unset` is the empty string and `Seen` is a bare integer.
impl Serialize for Marker {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Marker::Unset => serializer.serialize_str(""),
            Marker::Seen(ts) => serializer.serialize_i64(*ts),
        }
    }
}

impl<'de> Deserialize<'de> for Marker {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawMarker {
            Timestamp(i64),
            Text(String),
        }

        match RawMarker::deserialize(deserializer)? {
            RawMarker::Timestamp(ts) => Ok(Marker::Seen(ts)),
            RawMarker::Text(s) if s.is_empty() => Ok(Marker::Unset),
            RawMarker::Text(s) => Err(serde::de::Error::custom(format!(
                "expected an empty string or an integer timestamp, got {:?}",
                s
            ))),
        }
    }
}

/// One row of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedItem {
    pub id: ItemId,
    pub marker: Marker,
}

/// Full ID -> marker mapping, iterated in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreSnapshot {
    items: IndexMap<ItemId, Marker>,
}

impl StoreSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    #[cfg(test)]
    pub fn get(&self, id: ItemId) -> Option<Marker> {
        self.items.get(&id).copied()
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.items.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = TrackedItem> + '_ {
        self.items
            .iter()
            .map(|(id, marker)| TrackedItem { id: *id, marker: *marker })
    }

    /// Insert `id` as `Unset` if absent. Returns true if it was inserted.
    pub(crate) fn insert_unset(&mut self, id: ItemId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.items.insert(id, Marker::Unset);
        true
    }

    /// Remove `id`, keeping the order of the remaining items.
    pub(crate) fn remove(&mut self, id: ItemId) -> bool {
        self.items.shift_remove(&id).is_some()
    }

    /// Update the marker of an existing item. Unknown IDs are ignored.
    pub(crate) fn set(&mut self, id: ItemId, marker: Marker) -> bool {
        match self.items.get_mut(&id) {
            Some(slot) => {
                *slot = marker;
                true
            }
            None => false,
        }
    }
}

impl FromIterator<(ItemId, Marker)> for StoreSnapshot {
    fn from_iter<T: IntoIterator<Item = (ItemId, Marker)>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
pub(crate) fn id(raw: u64) -> ItemId {
    ItemId::new(raw).unwrap()
}
