//! Decides, per candidate record, whether it is new or a duplicate.
//!
//! The record's identity is normalized to its canonical key and its id is
//! registered under that key. Only records that introduce a new key are
//! forwarded downstream; everything else is counted and dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use seenkey_core::Normalizer;
use seenkey_store::{DedupStore, ExistsCode};

use crate::executor::Processor;
use crate::job::CandidateRecord;

/// A record whose key had never been seen, to be created remotely.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Accepted {
    pub key: String,
    pub id: String,
    pub record: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DedupStats {
    /// First record seen for its key.
    pub accepted: u64,
    /// Key already known under another id.
    pub duplicates: u64,
    /// Same (key, id) pair recorded by an earlier run.
    pub resumed: u64,
}

#[derive(Default)]
struct Tally {
    accepted: AtomicU64,
    duplicates: AtomicU64,
    resumed: AtomicU64,
}

pub struct DedupProcessor {
    store: Arc<DedupStore>,
    normalizer: Box<dyn Normalizer>,
    accepted: mpsc::Sender<Accepted>,
    tally: Tally,
}

impl DedupProcessor {
    pub fn new(
        store: Arc<DedupStore>,
        normalizer: Box<dyn Normalizer>,
        accepted: mpsc::Sender<Accepted>,
    ) -> Self {
        Self {
            store,
            normalizer,
            accepted,
            tally: Tally::default(),
        }
    }

    pub fn stats(&self) -> DedupStats {
        DedupStats {
            accepted: self.tally.accepted.load(Ordering::Acquire),
            duplicates: self.tally.duplicates.load(Ordering::Acquire),
            resumed: self.tally.resumed.load(Ordering::Acquire),
        }
    }
}

#[async_trait]
impl Processor<CandidateRecord> for DedupProcessor {
    async fn process(&self, candidate: &CandidateRecord) -> anyhow::Result<()> {
        let key = self
            .normalizer
            .normalize(&candidate.identity)
            .context("normalizing identity")?;

        let store = Arc::clone(&self.store);
        let (set_key, set_id) = (key.clone(), candidate.id.clone());
        let outcome = tokio::task::spawn_blocking(move || store.set(&set_key, &set_id))
            .await
            .context("store task failed")?
            .with_context(|| format!("recording id '{}' under '{key}'", candidate.id))?;

        match outcome.code {
            ExistsCode::NewKey => {
                let accepted = Accepted {
                    key,
                    id: candidate.id.clone(),
                    record: candidate.record.clone(),
                };
                self.accepted
                    .send(accepted)
                    .await
                    .map_err(|_| anyhow::anyhow!("accepted record sink is closed"))?;
                self.tally.accepted.fetch_add(1, Ordering::AcqRel);
            }
            ExistsCode::NewId => {
                debug!(key = %key, id = %candidate.id, known = ?outcome.ids, "duplicate record");
                self.tally.duplicates.fetch_add(1, Ordering::AcqRel);
            }
            ExistsCode::Exists => {
                self.tally.resumed.fetch_add(1, Ordering::AcqRel);
            }
            ExistsCode::Undefined => anyhow::bail!("store returned no decision for '{key}'"),
        }
        Ok(())
    }
}
