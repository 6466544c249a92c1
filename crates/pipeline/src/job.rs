use serde::{Deserialize, Serialize};

/// One unit of work for the [`crate::Executor`]: a payload plus where it
/// came from, so failures can be traced back to (and reprocessed from) the
/// original input.
#[derive(Debug)]
pub struct Job<P> {
    pub payload: P,
    /// Name of the input the record was read from (usually a file path).
    pub source: String,
    /// 1-based position of the record within `source`.
    pub record_number: u64,
    /// Set when reading or processing the record failed.
    pub error: Option<anyhow::Error>,
}

impl<P> Job<P> {
    pub fn new(payload: P, source: impl Into<String>, record_number: u64) -> Self {
        Self {
            payload,
            source: source.into(),
            record_number,
            error: None,
        }
    }

    pub fn with_error(mut self, error: anyhow::Error) -> Self {
        self.error = Some(error);
        self
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// A record read from import input, awaiting a dedup decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// Id the record is registered under in the store. Stable across runs
    /// over the same input, so a resumed import sees its own earlier work
    /// as `Exists` rather than as a duplicate.
    pub id: String,
    /// Raw identity (URI or name) the canonical key is derived from.
    pub identity: String,
    /// The record as read, passed through to the output untouched.
    pub record: serde_json::Value,
}

impl CandidateRecord {
    pub fn new(id: impl Into<String>, identity: impl Into<String>, record: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            identity: identity.into(),
            record,
        }
    }

    /// A record that is nothing but its identity string.
    pub fn from_identity(id: impl Into<String>, identity: impl Into<String>) -> Self {
        let identity = identity.into();
        Self {
            id: id.into(),
            record: serde_json::Value::String(identity.clone()),
            identity,
        }
    }
}

/// Id for a record without one of its own: its position in the input.
pub fn provenance_id(source: &str, record_number: u64) -> String {
    format!("{source}:{record_number}")
}
