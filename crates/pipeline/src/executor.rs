//! Bounded concurrent job executor.
//!
//! `n` worker tasks pull [`Job`]s from a queue of capacity `n` and hand each
//! payload to a [`Processor`]. Failed jobs (including jobs that arrive with an
//! error already attached) are forwarded over a buffered channel to a single
//! error-handler task, so the handler can own its output sink without locking.
//!
//! ```text
//!   submit() ──► [queue: n] ──► worker 1..n ──► Processor::process
//!                                   │ failure
//!                                   ▼
//!                            [errors: n] ──► on_error (one task)
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::PipelineError;
use crate::job::Job;

/// Per-job processing logic injected into the [`Executor`].
#[async_trait]
pub trait Processor<P>: Send + Sync {
    async fn process(&self, payload: &P) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutorStats {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    total: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> ExecutorStats {
        ExecutorStats {
            total: self.total.load(Ordering::Acquire),
            succeeded: self.succeeded.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
        }
    }
}

pub struct Executor<P> {
    queue: mpsc::Sender<Job<P>>,
    workers: Vec<JoinHandle<()>>,
    error_handler: JoinHandle<()>,
    counters: Arc<Counters>,
}

impl<P: Send + Sync + 'static> Executor<P> {
    /// Start `workers` worker tasks and the error-handler task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<H>(
        workers: usize,
        processor: Arc<dyn Processor<P>>,
        on_error: H,
    ) -> Result<Self, PipelineError>
    where
        H: FnMut(Job<P>) + Send + 'static,
    {
        if workers == 0 {
            return Err(PipelineError::InvalidWorkerCount);
        }

        let (queue_tx, queue_rx) = mpsc::channel::<Job<P>>(workers);
        let (error_tx, error_rx) = mpsc::channel::<Job<P>>(workers);
        let queue_rx = Arc::new(Mutex::new(queue_rx));
        let counters = Arc::new(Counters::default());

        let handles = (0..workers)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    Arc::clone(&queue_rx),
                    Arc::clone(&processor),
                    error_tx.clone(),
                    Arc::clone(&counters),
                ))
            })
            .collect();

        // Workers hold the only senders, so the handler ends once they do.
        drop(error_tx);
        let error_handler = tokio::spawn(run_error_handler(error_rx, on_error));

        debug!(workers, "executor started");

        Ok(Self {
            queue: queue_tx,
            workers: handles,
            error_handler,
            counters,
        })
    }

    /// Queue a job, waiting while the queue is full.
    pub async fn submit(&self, job: Job<P>) -> Result<(), PipelineError> {
        self.queue
            .send(job)
            .await
            .map_err(|_| PipelineError::QueueClosed)
    }

    /// Counts so far. Jobs still queued or in flight are not included.
    pub fn progress(&self) -> ExecutorStats {
        self.counters.snapshot()
    }

    /// Close the queue, drain it, and wait for every job (and every error
    /// handler call) to finish.
    pub async fn wait(self) -> ExecutorStats {
        let Self {
            queue,
            workers,
            error_handler,
            counters,
        } = self;
        drop(queue);

        for handle in workers {
            if let Err(e) = handle.await {
                error!(error = %e, "executor worker terminated abnormally");
            }
        }
        if let Err(e) = error_handler.await {
            error!(error = %e, "executor error handler terminated abnormally");
        }

        let stats = counters.snapshot();
        info!(
            total = stats.total,
            succeeded = stats.succeeded,
            failed = stats.failed,
            "executor drained"
        );
        stats
    }
}

async fn run_worker<P: Send + Sync + 'static>(
    worker_id: usize,
    queue: Arc<Mutex<mpsc::Receiver<Job<P>>>>,
    processor: Arc<dyn Processor<P>>,
    errors: mpsc::Sender<Job<P>>,
    counters: Arc<Counters>,
) {
    loop {
        let next = queue.lock().await.recv().await;
        let Some(mut job) = next else { break };
        counters.total.fetch_add(1, Ordering::AcqRel);

        if job.error.is_none() {
            let outcome = AssertUnwindSafe(processor.process(&job.payload))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(())) => {
                    counters.succeeded.fetch_add(1, Ordering::AcqRel);
                    continue;
                }
                Ok(Err(e)) => job.error = Some(e),
                Err(panic) => {
                    job.error = Some(anyhow::anyhow!(
                        "processor panicked: {}",
                        panic_message(panic.as_ref())
                    ))
                }
            }
        }

        counters.failed.fetch_add(1, Ordering::AcqRel);
        if errors.send(job).await.is_err() {
            error!(worker_id, "error handler is gone, dropping failed job");
        }
    }
    debug!(worker_id, "executor worker finished");
}

async fn run_error_handler<P, H>(mut errors: mpsc::Receiver<Job<P>>, mut on_error: H)
where
    H: FnMut(Job<P>),
{
    while let Some(job) = errors.recv().await {
        on_error(job);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
