//! Duplicate report: one JSON line per canonical key owned by more than one
//! remote object.

use std::io::Write;
use std::sync::Arc;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use seenkey_core::RemoteObjectFetcher;
use seenkey_store::DedupStore;

use crate::error::PipelineError;

/// Duplicate entries buffered between the store scan and the writer.
const SCAN_BUFFER: usize = 256;
/// Concurrent remote lookups per duplicate entry.
const LOOKUP_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateReportRecord {
    pub key: String,
    pub ids: Vec<String>,
    /// Resolved remote objects, in id order. Ids whose lookup failed are
    /// left out. Absent when the report runs without a fetcher.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportStats {
    /// Keys with more than one id.
    pub duplicate_keys: u64,
    /// Sum of id-list lengths over those keys.
    pub duplicate_ids: u64,
    /// Remote lookups that failed and were omitted.
    pub failed_lookups: u64,
}

/// Scan `store` and write every duplicate entry to `writer` as a JSON line.
///
/// The store is only read. With a `fetcher`, every id of a duplicate entry
/// is resolved; a failed lookup is logged and omitted from its record but
/// never aborts the scan.
pub async fn report<W>(
    store: Arc<DedupStore>,
    writer: &mut W,
    fetcher: Option<&dyn RemoteObjectFetcher>,
) -> Result<ReportStats, PipelineError>
where
    W: Write + Send,
{
    let (tx, mut rx) = mpsc::channel::<(String, Vec<String>)>(SCAN_BUFFER);

    let scan = tokio::task::spawn_blocking(move || {
        store.iterate(|key, ids| {
            if ids.len() > 1 && tx.blocking_send((key.to_string(), ids.to_vec())).is_err() {
                // Receiver dropped because writing failed; that error wins.
                return Err(PipelineError::Task("report writer stopped".to_string()));
            }
            Ok(())
        })
    });

    let written = write_records(&mut rx, writer, fetcher).await;
    drop(rx);
    let scanned = scan.await;

    let stats = written?;
    scanned??;
    writer.flush()?;

    info!(
        duplicate_keys = stats.duplicate_keys,
        duplicate_ids = stats.duplicate_ids,
        failed_lookups = stats.failed_lookups,
        "duplicate report complete"
    );
    Ok(stats)
}

async fn write_records<W: Write + Send>(
    rx: &mut mpsc::Receiver<(String, Vec<String>)>,
    writer: &mut W,
    fetcher: Option<&dyn RemoteObjectFetcher>,
) -> Result<ReportStats, PipelineError> {
    let mut stats = ReportStats::default();

    while let Some((key, ids)) = rx.recv().await {
        let objects = match fetcher {
            Some(fetcher) => {
                let (objects, failed) = resolve(fetcher, &key, &ids).await;
                stats.failed_lookups += failed;
                Some(objects)
            }
            None => None,
        };

        stats.duplicate_keys += 1;
        stats.duplicate_ids += ids.len() as u64;

        let record = DuplicateReportRecord { key, ids, objects };
        serde_json::to_writer(&mut *writer, &record)?;
        writer.write_all(b"\n")?;
    }

    Ok(stats)
}

async fn resolve(
    fetcher: &dyn RemoteObjectFetcher,
    key: &str,
    ids: &[String],
) -> (Vec<serde_json::Value>, u64) {
    let results: Vec<_> = futures::stream::iter(ids)
        .map(|id| async move { (id, fetcher.fetch(id).await) })
        .buffered(LOOKUP_CONCURRENCY)
        .collect()
        .await;

    let mut objects = Vec::with_capacity(results.len());
    let mut failed = 0;
    for (id, result) in results {
        match result {
            Ok(object) => objects.push(object),
            Err(e) => {
                warn!(key = key, id = %id, error = %e, "remote lookup failed, omitting object");
                failed += 1;
            }
        }
    }
    (objects, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use seenkey_core::RemoteError;
    use uuid::Uuid;

    fn open_store() -> (Arc<DedupStore>, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("seenkey-report-test-{}", Uuid::new_v4()));
        (Arc::new(DedupStore::open(&dir, false).unwrap()), dir)
    }

    /// Store with id-list lengths [1, 1, 3, 2, 1] in key order.
    fn populate(store: &DedupStore) {
        let layout: [(&str, usize); 5] = [("a", 1), ("b", 1), ("c", 3), ("d", 2), ("e", 1)];
        for (key, count) in layout {
            for i in 0..count {
                store.set(key, &format!("{key}{i}")).unwrap();
            }
        }
    }

    fn parse_lines(out: &[u8]) -> Vec<DuplicateReportRecord> {
        String::from_utf8(out.to_vec())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn reports_only_keys_with_several_ids() {
        let (store, dir) = open_store();
        populate(&store);

        let mut out = Vec::new();
        let stats = report(store.clone(), &mut out, None).await.unwrap();

        assert_eq!(stats.duplicate_keys, 2);
        assert_eq!(stats.duplicate_ids, 5);
        let records = parse_lines(&out);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key, "c");
        assert_eq!(records[0].ids, vec!["c0", "c1", "c2"]);
        assert_eq!(records[1].key, "d");
        assert!(records.iter().all(|r| r.objects.is_none()));
        assert!(!String::from_utf8(out).unwrap().contains("objects"));

        store.close().unwrap();
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn empty_store_reports_nothing() {
        let (store, dir) = open_store();
        let mut out = Vec::new();
        let stats = report(store.clone(), &mut out, None).await.unwrap();
        assert_eq!(stats, ReportStats::default());
        assert!(out.is_empty());
        store.close().unwrap();
        std::fs::remove_dir_all(&dir).ok();
    }

    /// Resolves every id except those listed as missing.
    struct MapFetcher {
        missing: Vec<&'static str>,
    }

    #[async_trait]
    impl RemoteObjectFetcher for MapFetcher {
        async fn fetch(&self, id: &str) -> Result<serde_json::Value, RemoteError> {
            if self.missing.iter().any(|m| *m == id) {
                return Err(RemoteError::NotFound(id.to_string()));
            }
            Ok(serde_json::json!({ "id": id, "kind": "seed" }))
        }
    }

    #[tokio::test]
    async fn fetcher_enriches_records_and_omits_failed_lookups() {
        let (store, dir) = open_store();
        populate(&store);
        let fetcher = MapFetcher { missing: vec!["c1"] };

        let mut out = Vec::new();
        let stats = report(store.clone(), &mut out, Some(&fetcher)).await.unwrap();
        assert_eq!(stats.duplicate_keys, 2);
        assert_eq!(stats.failed_lookups, 1);

        let records = parse_lines(&out);
        let c_objects = records[0].objects.as_ref().unwrap();
        assert_eq!(
            c_objects,
            &vec![
                serde_json::json!({ "id": "c0", "kind": "seed" }),
                serde_json::json!({ "id": "c2", "kind": "seed" }),
            ]
        );
        assert_eq!(records[0].ids.len(), 3);
        assert_eq!(records[1].objects.as_ref().unwrap().len(), 2);

        store.close().unwrap();
        std::fs::remove_dir_all(&dir).ok();
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn writer_failure_is_reported() {
        let (store, dir) = open_store();
        populate(&store);
        let err = report(store.clone(), &mut FailingWriter, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Json(_) | PipelineError::Io(_)));
        store.close().unwrap();
        std::fs::remove_dir_all(&dir).ok();
    }
}
