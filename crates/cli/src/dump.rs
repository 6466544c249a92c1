//! File-backed view of remote objects.
//!
//! A dump is JSONL, one object per line, each with at least a string `id`
//! and a string `identity`. It serves both as the listing for
//! `import-existing` and as the lookup source for `report --objects`.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, warn};

use seenkey_core::{Kind, RemoteError, RemoteObject, RemoteObjectFetcher, RemoteObjectLister};

pub struct ObjectDump {
    objects: Vec<RemoteObject>,
    records: HashMap<String, serde_json::Value>,
}

impl ObjectDump {
    pub fn load(path: &Path) -> Result<Self, RemoteError> {
        let file = File::open(path).map_err(|e| {
            RemoteError::Unavailable(format!("cannot open {}: {e}", path.display()))
        })?;

        let mut objects = Vec::new();
        let mut records = HashMap::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let at = || format!("{}:{}", path.display(), idx + 1);
            let value: serde_json::Value = serde_json::from_str(&line)
                .map_err(|e| RemoteError::Decode(format!("{}: {e}", at())))?;

            let id = string_field(&value, "id").ok_or_else(|| {
                RemoteError::Decode(format!("{}: missing string field 'id'", at()))
            })?;
            let identity = string_field(&value, "identity").ok_or_else(|| {
                RemoteError::Decode(format!("{}: missing string field 'identity'", at()))
            })?;

            if records.insert(id.clone(), value).is_some() {
                warn!(id = %id, line = idx + 1, "object listed twice in dump");
            }
            objects.push(RemoteObject::new(id, identity));
        }

        debug!(path = %path.display(), objects = objects.len(), "object dump loaded");
        Ok(Self { objects, records })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

fn string_field(value: &serde_json::Value, field: &str) -> Option<String> {
    value.get(field)?.as_str().map(str::to_string)
}

impl RemoteObjectLister for ObjectDump {
    // A dump holds objects of a single kind, whichever was requested.
    fn list(&self, _kind: Kind) -> BoxStream<'_, Result<RemoteObject, RemoteError>> {
        stream::iter(self.objects.iter().cloned().map(Ok)).boxed()
    }
}

#[async_trait]
impl RemoteObjectFetcher for ObjectDump {
    async fn fetch(&self, id: &str) -> Result<serde_json::Value, RemoteError> {
        self.records
            .get(id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }
}
