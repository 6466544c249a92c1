//! Pre-populates a dedup store with the objects that already exist remotely,
//! so later imports recognize them as duplicates.

use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tracing::{info, warn};

use seenkey_core::{Kind, Normalizer, RemoteObjectLister};
use seenkey_store::DedupStore;

use crate::error::PipelineError;

const DEFAULT_PROGRESS_INTERVAL: u64 = 10_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    /// Objects received from the lister.
    pub processed: u64,
    /// Objects whose (key, id) pair was recorded for the first time.
    pub imported: u64,
    /// Objects already recorded by an earlier run.
    pub already_known: u64,
    /// Objects whose identity could not be normalized.
    pub failed: u64,
}

pub struct ExistingStateImporter<'a> {
    store: Arc<DedupStore>,
    normalizer: &'a dyn Normalizer,
    progress_interval: u64,
}

impl<'a> ExistingStateImporter<'a> {
    pub fn new(store: Arc<DedupStore>, normalizer: &'a dyn Normalizer) -> Self {
        Self {
            store,
            normalizer,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    pub fn progress_interval(mut self, every: u64) -> Self {
        self.progress_interval = every.max(1);
        self
    }

    /// Stream every existing object of `kind` into the store.
    ///
    /// Identities that fail to normalize are logged and skipped. A failure
    /// of the listing itself aborts the run; everything recorded before it
    /// stays in the store.
    pub async fn run(
        &self,
        lister: &dyn RemoteObjectLister,
        kind: Kind,
    ) -> Result<ImportStats, PipelineError> {
        let mut stats = ImportStats::default();
        let mut objects = lister.list(kind);

        info!(kind = %kind, store = %self.store.path().display(), "importing existing objects");

        while let Some(item) = objects.next().await {
            let object = match item {
                Ok(object) => object,
                Err(e) => {
                    warn!(
                        kind = %kind,
                        processed = stats.processed,
                        error = %e,
                        "listing existing objects failed, aborting import"
                    );
                    return Err(e.into());
                }
            };
            stats.processed += 1;

            let key = match self.normalizer.normalize(&object.identity) {
                Ok(key) => key,
                Err(e) => {
                    warn!(
                        kind = %kind,
                        id = %object.id,
                        identity = %object.identity,
                        error = %e,
                        "skipping existing object"
                    );
                    stats.failed += 1;
                    continue;
                }
            };

            let store = Arc::clone(&self.store);
            let id = object.id;
            let outcome = tokio::task::spawn_blocking(move || store.set(&key, &id)).await??;
            if outcome.code.is_new() {
                stats.imported += 1;
            } else {
                stats.already_known += 1;
            }

            if stats.processed % self.progress_interval == 0 {
                info!(
                    kind = %kind,
                    processed = stats.processed,
                    imported = stats.imported,
                    failed = stats.failed,
                    "import progress"
                );
            }
        }

        info!(
            kind = %kind,
            processed = stats.processed,
            imported = stats.imported,
            already_known = stats.already_known,
            failed = stats.failed,
            "existing objects imported"
        );
        Ok(stats)
    }
}

/// Import every existing object of `kind` with default settings.
pub async fn import_existing(
    store: Arc<DedupStore>,
    lister: &dyn RemoteObjectLister,
    kind: Kind,
    normalizer: &dyn Normalizer,
) -> Result<ImportStats, PipelineError> {
    ExistingStateImporter::new(store, normalizer)
        .run(lister, kind)
        .await
}
