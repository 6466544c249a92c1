//! Background compaction for a dedup store.
//!
//! A dedicated thread wakes every interval and compacts the database file.
//! Compaction needs exclusive access to the engine, so it only runs when it
//! can take the engine without waiting; a busy store simply skips the tick.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::RwLock;
use redb::Database;
use tracing::{debug, info, warn};

use crate::error::StoreError;

/// Handle to a running compactor thread. Stopping (or dropping) the handle
/// signals the thread and joins it.
pub struct Compactor {
    stop: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Compactor {
    pub(crate) fn spawn(
        db: Weak<RwLock<Database>>,
        interval: Duration,
        label: String,
    ) -> Result<Self, StoreError> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("seenkey-compactor".to_string())
            .spawn(move || {
                debug!(store = %label, interval_secs = interval.as_secs(), "compactor started");
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        // Explicit stop, or the store went away without stopping us.
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    let Some(db) = db.upgrade() else { break };
                    match try_compact(&db) {
                        Ok(Some(true)) => info!(store = %label, "store compacted"),
                        Ok(Some(false)) => debug!(store = %label, "nothing to compact"),
                        Ok(None) => debug!(store = %label, "store busy, compaction skipped"),
                        Err(e) => warn!(store = %label, error = %e, "compaction failed"),
                    }
                }
                debug!(store = %label, "compactor stopped");
            })?;

        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("compactor thread panicked");
            }
        }
    }
}

impl Drop for Compactor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Compact if the engine is idle.
///
/// Returns `None` when any operation holds the engine, otherwise whether
/// compaction reclaimed anything.
pub(crate) fn try_compact(db: &RwLock<Database>) -> Result<Option<bool>, StoreError> {
    let Some(mut guard) = db.try_write() else {
        return Ok(None);
    };
    Ok(Some(guard.compact()?))
}
