use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::BoxStream;
use uuid::Uuid;

use seenkey_core::{Kind, RemoteError, RemoteObject, RemoteObjectLister};
use seenkey_store::DedupStore;

/// Create a unique temp directory for each test.
pub fn test_data_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("seenkey-pipeline-test-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn open_store(data_dir: &Path) -> Arc<DedupStore> {
    Arc::new(DedupStore::open(data_dir.join("store"), false).unwrap())
}

pub fn write_input(data_dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
    let path = data_dir.join(name);
    std::fs::write(&path, lines.join("\n") + "\n").unwrap();
    path
}

pub fn parse_jsonl(bytes: &[u8]) -> Vec<serde_json::Value> {
    std::str::from_utf8(bytes)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

/// Lister over a fixed set of existing objects.
pub struct FixedLister(pub Vec<RemoteObject>);

impl RemoteObjectLister for FixedLister {
    fn list(&self, _kind: Kind) -> BoxStream<'_, Result<RemoteObject, RemoteError>> {
        Box::pin(futures::stream::iter(self.0.iter().cloned().map(Ok)))
    }
}
