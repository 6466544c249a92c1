use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use redb::{Database, Durability, ReadableTable, TableDefinition};
use tracing::{debug, info, trace};

use crate::codec::{decode_ids, encode_ids};
use crate::compaction::{try_compact, Compactor};
use crate::error::StoreError;
use crate::types::{ExistsCode, SetOutcome, StoreStats};


const ENTRIES: TableDefinition<&str, &[u8]> = TableDefinition::new("entries");

/// File name of the database inside the store directory.
pub const DB_FILE: &str = "entries.redb";

/// Entries decoded in parallel per scan step of [`DedupStore::iterate`].
const ITERATE_BATCH: usize = 1024;

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Wipe all existing entries on open.
    pub truncate: bool,
    /// How often the background compactor wakes up.
    pub compaction_interval: Duration,
    /// Make every commit durable before `set` returns. When false, commits
    /// use eventual durability and `close` issues a final durable commit.
    pub sync_writes: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            truncate: false,
            compaction_interval: Duration::from_secs(300),
            sync_writes: true,
        }
    }
}

/// Persistent `canonical key → ids` mapping backed by redb.
///
/// Safe to share between threads (`Arc<DedupStore>`); `set` may be called
/// concurrently on the same key without losing ids.
pub struct DedupStore {
    db: Arc<RwLock<Database>>,
    path: PathBuf,
    sync_writes: bool,
    compactor: Mutex<Option<Compactor>>,
    closed: AtomicBool,
}

impl DedupStore {
    /// Open (creating if needed) the store in directory `path`.
    pub fn open(path: impl AsRef<Path>, truncate: bool) -> Result<Self, StoreError> {
        Self::open_with(
            path,
            StoreOptions {
                truncate,
                ..StoreOptions::default()
            },
        )
    }

    pub fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if options.truncate && path.exists() {
            info!(path = %path.display(), "truncating dedup store");
            std::fs::remove_dir_all(&path)?;
        }
        std::fs::create_dir_all(&path)?;

        let db = Database::create(path.join(DB_FILE))?;

        // Create the table up front so readers never see it missing.
        let txn = db.begin_write()?;
        {
            let _ = txn.open_table(ENTRIES)?;
        }
        txn.commit()?;

        let db = Arc::new(RwLock::new(db));
        let compactor = Compactor::spawn(
            Arc::downgrade(&db),
            options.compaction_interval,
            path.display().to_string(),
        )?;

        info!(path = %path.display(), sync_writes = options.sync_writes, "dedup store opened");

        Ok(Self {
            db,
            path,
            sync_writes: options.sync_writes,
            compactor: Mutex::new(Some(compactor)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    /// Ids recorded under `key`, in discovery order. Empty if absent.
    pub fn get(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.ensure_open()?;
        let db = self.db.read_recursive();
        match read_raw(&db, key)? {
            Some(raw) => decode_ids(&raw),
            None => Ok(Vec::new()),
        }
    }

    /// Record that `id` owns `key`.
    ///
    /// Optimistic read-modify-write: the record is read in a snapshot, and
    /// the write transaction only commits if the record is still unchanged.
    /// A concurrent `set` committing in between makes this one start over,
    /// so callers never see a conflict and no id is ever dropped.
    pub fn set(&self, key: &str, id: &str) -> Result<SetOutcome, StoreError> {
        self.ensure_open()?;
        let db = self.db.read_recursive();
        let mut conflicts = 0u32;

        loop {
            let snapshot = read_raw(&db, key)?;
            let mut ids = match &snapshot {
                Some(raw) => decode_ids(raw)?,
                None => Vec::new(),
            };

            if ids.iter().any(|existing| existing == id) {
                return Ok(SetOutcome {
                    code: ExistsCode::Exists,
                    ids,
                });
            }

            let code = if snapshot.is_none() {
                ExistsCode::NewKey
            } else {
                ExistsCode::NewId
            };
            ids.push(id.to_string());
            let encoded = encode_ids(&ids)?;

            let mut txn = db.begin_write()?;
            if !self.sync_writes {
                txn.set_durability(Durability::Eventual);
            }
            let unchanged = {
                let mut table = txn.open_table(ENTRIES)?;
                let current = table.get(key)?.map(|v| v.value().to_vec());
                if current == snapshot {
                    table.insert(key, encoded.as_slice())?;
                    true
                } else {
                    false
                }
            };

            if !unchanged {
                txn.abort()?;
                conflicts += 1;
                trace!(key = key, id = id, conflicts, "write conflict, retrying");
                std::thread::yield_now();
                continue;
            }

            txn.commit()?;
            if conflicts > 0 {
                debug!(key = key, id = id, conflicts, "set committed after retries");
            }
            return Ok(SetOutcome { code, ids });
        }
    }

    /// Visit every entry in key order.
    ///
    /// Entries are decoded in parallel batches, but `f` is always called
    /// from the calling thread, one entry at a time. The first error
    /// returned by `f` stops the scan.
    pub fn iterate<F, E>(&self, mut f: F) -> Result<(), E>
    where
        F: FnMut(&str, &[String]) -> Result<(), E>,
        E: From<StoreError>,
    {
        self.ensure_open()?;
        let db = self.db.read_recursive();
        let txn = db.begin_read().map_err(StoreError::from)?;
        let table = txn.open_table(ENTRIES).map_err(StoreError::from)?;

        let mut batch: Vec<(String, Vec<u8>)> = Vec::with_capacity(ITERATE_BATCH);
        let mut last_key: Option<String> = None;

        loop {
            batch.clear();
            let lower = match &last_key {
                Some(k) => Bound::Excluded(k.as_str()),
                None => Bound::Unbounded,
            };
            for row in table
                .range::<&str>((lower, Bound::Unbounded))
                .map_err(StoreError::from)?
                .take(ITERATE_BATCH)
            {
                let (k, v) = row.map_err(StoreError::from)?;
                batch.push((k.value().to_string(), v.value().to_vec()));
            }

            if batch.is_empty() {
                return Ok(());
            }

            let decoded: Vec<Vec<String>> = batch
                .par_iter()
                .map(|(_, raw)| decode_ids(raw))
                .collect::<Result<_, StoreError>>()?;

            for ((key, _), ids) in batch.iter().zip(&decoded) {
                f(key, ids)?;
            }

            if batch.len() < ITERATE_BATCH {
                return Ok(());
            }
            last_key = batch.last().map(|(k, _)| k.clone());
        }
    }

    /// Count keys, ids and duplicate keys with a full scan.
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let mut stats = StoreStats::default();
        self.iterate(|_, ids| {
            stats.keys += 1;
            stats.ids += ids.len() as u64;
            if ids.len() > 1 {
                stats.duplicate_keys += 1;
            }
            Ok::<(), StoreError>(())
        })?;
        Ok(stats)
    }

    /// Run one compaction pass now, if the store is idle.
    ///
    /// Returns `Ok(false)` when there was nothing to compact or the store
    /// was busy.
    pub fn compact(&self) -> Result<bool, StoreError> {
        self.ensure_open()?;
        Ok(try_compact(&self.db)?.unwrap_or(false))
    }

    /// Stop background maintenance, make all writes durable and compact.
    ///
    /// Calling `close` again is a no-op. Every other operation fails with
    /// [`StoreError::Closed`] afterwards.
    pub fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        if let Some(compactor) = self.compactor.lock().take() {
            compactor.stop();
        }

        let mut db = self.db.write();
        if !self.sync_writes {
            let mut txn = db.begin_write()?;
            txn.set_durability(Durability::Immediate);
            txn.commit()?;
        }
        let compacted = db.compact()?;

        info!(path = %self.path.display(), compacted, "dedup store closed");
        Ok(())
    }
}

fn read_raw(db: &Database, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
    let txn = db.begin_read()?;
    let table = txn.open_table(ENTRIES)?;
    let raw = table.get(key)?.map(|v| v.value().to_vec());
    Ok(raw)
}
