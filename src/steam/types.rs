use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::store::ItemId;

/// Body of `GetPublishedFileDetails/v1`.
#[derive(Debug, Deserialize)]
pub struct DetailsEnvelope {
    pub response: DetailsResponse,
}

/// Records are kept as raw JSON until matched, so one record with an odd
/// shape only affects its own item.
#[derive(Debug, Default, Deserialize)]
pub struct DetailsResponse {
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub resultcount: Value,
    #[serde(default)]
    pub publishedfiledetails: Vec<Value>,
}

/// Steam result code for a record that exists and is visible.
pub const RESULT_OK: i64 = 1;

/// One record of the response. Steam sends `publishedfileid` as a string
/// and omits most fields for unknown or hidden items. Fields stay untyped
/// and are interpreted by the accessors below.
#[derive(Debug, Default, Deserialize)]
pub struct PublishedFileDetail {
    #[serde(default)]
    pub publishedfileid: Value,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub time_updated: Value,
    #[serde(default)]
    pub title: Value,
}

impl PublishedFileDetail {
    /// Interpret one raw record. `None` if it is not a JSON object.
    pub fn parse(raw: Value) -> Option<Self> {
        serde_json::from_value(raw).ok()
    }

    pub fn item_id(&self) -> Option<ItemId> {
        match &self.publishedfileid {
            Value::String(s) => s.parse::<u64>().ok().and_then(ItemId::new),
            Value::Number(n) => n.as_u64().and_then(ItemId::new),
            _ => None,
        }
    }

    /// Result code, if present and an integer.
    pub fn result_code(&self) -> Option<i64> {
        self.result.as_i64()
    }

    /// `time_updated`, if present and an integer.
    pub fn time_updated(&self) -> Option<i64> {
        self.time_updated.as_i64()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_str()
    }
}

/// Why no usable marker came back for a requested item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingReason {
    /// No record carried this ID.
    NotReturned,
    /// Steam returned a non-OK result code (deleted, private, unknown).
    NotFound(i64),
    /// The record had no `time_updated` field.
    NoTimestamp,
    /// The request for the chunk containing this ID failed.
    RequestFailed,
}

impl fmt::Display for MissingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingReason::NotReturned => write!(f, "not returned by Steam"),
            MissingReason::NotFound(code) => write!(f, "Steam result code {}", code),
            MissingReason::NoTimestamp => write!(f, "no time_updated field"),
            MissingReason::RequestFailed => write!(f, "request failed"),
        }
    }
}

/// Outcome for a single requested item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteDetail {
    Updated(i64),
    Missing(MissingReason),
}

impl From<&PublishedFileDetail> for RemoteDetail {
    fn from(detail: &PublishedFileDetail) -> Self {
        match detail.result_code() {
            Some(code) if code != RESULT_OK => RemoteDetail::Missing(MissingReason::NotFound(code)),
            _ => match detail.time_updated() {
                Some(ts) => RemoteDetail::Updated(ts),
                None => RemoteDetail::Missing(MissingReason::NoTimestamp),
            },
        }
    }
}

/// Per-ID details for one fetch, keyed by the ID inside each record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteDetailBatch {
    details: HashMap<ItemId, RemoteDetail>,
}

impl RemoteDetailBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match a response against the IDs that were requested.
    ///
    /// Records are paired by their `publishedfileid`, not by position, so a
    /// re-ordered or short response still lands on the right items. Records
    /// for IDs that were not requested are dropped.
    pub fn from_response(requested: &[ItemId], response: DetailsResponse) -> Self {
        let mut by_id: HashMap<ItemId, RemoteDetail> = HashMap::new();
        for raw in response.publishedfiledetails {
            let Some(record) = PublishedFileDetail::parse(raw) else {
                tracing::debug!("Skipping detail record that is not an object");
                continue;
            };
            match record.item_id() {
                Some(id) => {
                    tracing::trace!(
                        id = %id,
                        title = record.title().unwrap_or_default(),
                        "Matched detail record"
                    );
                    by_id.entry(id).or_insert_with(|| RemoteDetail::from(&record));
                }
                None => tracing::debug!(
                    publishedfileid = %record.publishedfileid,
                    "Skipping detail record without a usable ID"
                ),
            }
        }

        requested
            .iter()
            .map(|id| {
                let detail = by_id
                    .remove(id)
                    .unwrap_or(RemoteDetail::Missing(MissingReason::NotReturned));
                (*id, detail)
            })
            .collect()
    }

    pub fn get(&self, id: ItemId) -> Option<RemoteDetail> {
        self.details.get(&id).copied()
    }

    #[cfg(test)]
    pub fn insert(&mut self, id: ItemId, detail: RemoteDetail) {
        self.details.insert(id, detail);
    }

    pub fn len(&self) -> usize {
        self.details.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }
}

impl FromIterator<(ItemId, RemoteDetail)> for RemoteDetailBatch {
    fn from_iter<T: IntoIterator<Item = (ItemId, RemoteDetail)>>(iter: T) -> Self {
        Self {
            details: iter.into_iter().collect(),
        }
    }
}

impl Extend<(ItemId, RemoteDetail)> for RemoteDetailBatch {
    fn extend<T: IntoIterator<Item = (ItemId, RemoteDetail)>>(&mut self, iter: T) {
        self.details.extend(iter);
    }
}

impl IntoIterator for RemoteDetailBatch {
    type Item = (ItemId, RemoteDetail);
    type IntoIter = std::collections::hash_map::IntoIter<ItemId, RemoteDetail>;

    fn into_iter(self) -> Self::IntoIter {
        self.details.into_iter()
    }
}
