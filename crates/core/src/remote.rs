//! Collaborator interfaces onto the remote system being imported into.
//!
//! The dedup engine never talks to the remote system directly. The connection
//! layer supplies a lister (to pre-populate a store with what already exists)
//! and, optionally, a fetcher (to enrich duplicate reports).

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;
use crate::kind::Kind;

/// An object that already exists remotely: its id plus the raw identity
/// string (URI or name) the canonical key is derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub id: String,
    pub identity: String,
}

impl RemoteObject {
    pub fn new(id: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            identity: identity.into(),
        }
    }
}

/// Lazily lists every existing remote object of one kind.
///
/// An `Err` item means the listing itself broke; consumers abort on it.
pub trait RemoteObjectLister: Send + Sync {
    fn list(&self, kind: Kind) -> BoxStream<'_, Result<RemoteObject, RemoteError>>;
}

/// Resolves a single remote object by id.
#[async_trait]
pub trait RemoteObjectFetcher: Send + Sync {
    async fn fetch(&self, id: &str) -> Result<serde_json::Value, RemoteError>;
}
