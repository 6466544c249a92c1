use serde::{Deserialize, Serialize};

/// Outcome of recording a `(key, id)` pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExistsCode {
    /// Never returned by a successful `set`.
    #[default]
    Undefined,
    /// The key had not been seen before.
    NewKey,
    /// The key existed under other ids: the same identity now maps to more
    /// than one remote object.
    NewId,
    /// The pair was already recorded; nothing was written.
    Exists,
}

impl ExistsCode {
    /// Whether the pair was recorded for the first time.
    pub fn is_new(&self) -> bool {
        matches!(self, ExistsCode::NewKey | ExistsCode::NewId)
    }
}

/// Result of [`crate::DedupStore::set`]: the classification plus the id
/// list stored under the key after the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetOutcome {
    pub code: ExistsCode,
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of distinct keys.
    pub keys: u64,
    /// Number of ids across all keys.
    pub ids: u64,
    /// Keys mapping to more than one id.
    pub duplicate_keys: u64,
}
