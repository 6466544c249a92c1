use std::io::{BufWriter, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use seenkey_core::{Config, Kind, RemoteObjectFetcher};
use seenkey_pipeline::{
    report, Accepted, CandidateRecord, DedupProcessor, DedupStats, ErrorLog, Executor,
    ExecutorStats, ExistingStateImporter, Job, RecordReader,
};
use seenkey_store::{DedupStore, StoreOptions};

use crate::cli::{ImportArgs, ImportExistingArgs, ReportArgs};
use crate::dump::ObjectDump;

fn open_store(config: &Config, kind: Kind, truncate: bool) -> Result<Arc<DedupStore>> {
    let dir = config.storage.store_dir(kind);
    let options = StoreOptions {
        truncate,
        compaction_interval: config.storage.compaction_interval(),
        sync_writes: config.storage.sync_writes,
    };
    let store = DedupStore::open_with(&dir, options)
        .with_context(|| format!("failed to open store at {}", dir.display()))?;
    Ok(Arc::new(store))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut out = std::io::stdout();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

pub async fn import_existing(config: &Config, args: ImportExistingArgs) -> Result<()> {
    let kind = args.kind.kind;
    let dump = ObjectDump::load(&args.from)
        .with_context(|| format!("failed to load existing objects from {}", args.from.display()))?;
    if dump.is_empty() {
        warn!(path = %args.from.display(), "dump holds no objects");
    } else {
        info!(path = %args.from.display(), objects = dump.len(), "dump loaded");
    }
    let store = open_store(config, kind, args.reset)?;
    let normalizer = kind.default_normalizer(args.normalize.options());

    let stats = ExistingStateImporter::new(Arc::clone(&store), normalizer.as_ref())
        .progress_interval(config.pipeline.progress_interval)
        .run(&dump, kind)
        .await;
    store.close().context("failed to close store")?;

    print_json(&stats.context("import of existing objects failed")?)
}

#[derive(Serialize)]
struct ImportSummary {
    #[serde(flatten)]
    jobs: ExecutorStats,
    #[serde(flatten)]
    decisions: DedupStats,
    logged_failures: u64,
}

pub async fn import(config: &Config, args: ImportArgs) -> Result<()> {
    let kind = args.kind.kind;
    let workers = args.workers.unwrap_or(config.pipeline.workers);
    let store = open_store(config, kind, false)?;

    let error_log = match &args.errors {
        Some(path) => Some(
            ErrorLog::create(path)
                .with_context(|| format!("failed to create error log {}", path.display()))?,
        ),
        None => None,
    };
    let (mut sink, error_log_back) = FailureSink::new(error_log);

    let (accepted_tx, accepted_rx) = mpsc::channel(workers.max(1));
    let writer = tokio::spawn(write_accepted(accepted_rx));

    let normalizer = kind.default_normalizer(args.normalize.options());
    let processor = Arc::new(DedupProcessor::new(Arc::clone(&store), normalizer, accepted_tx));

    let executor = Executor::<CandidateRecord>::new(workers, processor.clone(), move |job| {
        sink.record(&job);
    })?;

    info!(kind = %kind, workers, inputs = args.inputs.len(), "import started");

    let mut reader = RecordReader::new(&args.inputs, args.format).identity_field(args.field);
    if let Some(id_field) = args.id_field {
        reader = reader.id_field(id_field);
    }

    let progress_interval = config.pipeline.progress_interval;
    let mut submitted = 0u64;
    for job in reader {
        executor.submit(job).await?;
        submitted += 1;
        if submitted % progress_interval == 0 {
            let progress = executor.progress();
            let decisions = processor.stats();
            info!(
                submitted,
                succeeded = progress.succeeded,
                failed = progress.failed,
                accepted = decisions.accepted,
                duplicates = decisions.duplicates,
                "import progress"
            );
        }
    }

    let jobs = executor.wait().await;
    let decisions = processor.stats();
    // Last sender goes with the processor, which lets the writer finish.
    drop(processor);
    writer.await.context("output writer panicked")??;

    // The handler, and with it the sink, is gone once `wait` returns.
    let logged_failures = match error_log_back.await.ok().flatten() {
        Some(log) => {
            let written = log.written();
            log.into_inner().context("failed to flush error log")?;
            written
        }
        None => 0,
    };

    store.close().context("failed to close store")?;

    info!(
        kind = %kind,
        total = jobs.total,
        succeeded = jobs.succeeded,
        failed = jobs.failed,
        accepted = decisions.accepted,
        duplicates = decisions.duplicates,
        resumed = decisions.resumed,
        "import finished"
    );

    let summary = ImportSummary {
        jobs,
        decisions,
        logged_failures,
    };
    eprintln!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

/// Failure handling owned by the executor's error handler. The error log is
/// handed back over a oneshot when the handler is dropped.
struct FailureSink<W: Write> {
    log: Option<ErrorLog<W>>,
    back: Option<oneshot::Sender<Option<ErrorLog<W>>>>,
}

impl<W: Write> FailureSink<W> {
    fn new(log: Option<ErrorLog<W>>) -> (Self, oneshot::Receiver<Option<ErrorLog<W>>>) {
        let (tx, rx) = oneshot::channel();
        (Self { log, back: Some(tx) }, rx)
    }

    fn record(&mut self, job: &Job<CandidateRecord>) {
        log_failure(job);
        if let Some(log) = self.log.as_mut() {
            log.record_or_warn(job);
        }
    }
}

impl<W: Write> Drop for FailureSink<W> {
    fn drop(&mut self) {
        if let Some(back) = self.back.take() {
            let _ = back.send(self.log.take());
        }
    }
}

fn log_failure(job: &Job<CandidateRecord>) {
    let error = job
        .error
        .as_ref()
        .map(|e| format!("{e:#}"))
        .unwrap_or_default();
    warn!(
        source = %job.source,
        record_number = job.record_number,
        identity = %job.payload.identity,
        error = %error,
        "record failed"
    );
}

async fn write_accepted(mut accepted: mpsc::Receiver<Accepted>) -> Result<u64> {
    let mut out = tokio::io::BufWriter::new(tokio::io::stdout());
    let mut written = 0u64;
    while let Some(record) = accepted.recv().await {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        out.write_all(&line).await?;
        written += 1;
    }
    out.flush().await?;
    Ok(written)
}

pub async fn report_duplicates(config: &Config, args: ReportArgs) -> Result<()> {
    let kind = args.kind.kind;
    let dump = match &args.objects {
        Some(path) => Some(
            ObjectDump::load(path)
                .with_context(|| format!("failed to load objects from {}", path.display()))?,
        ),
        None => None,
    };
    let store = open_store(config, kind, false)?;

    let mut out = BufWriter::new(std::io::stdout());
    let fetcher = dump.as_ref().map(|d| d as &dyn RemoteObjectFetcher);
    let result = report(Arc::clone(&store), &mut out, fetcher).await;
    out.flush()?;
    store.close().context("failed to close store")?;

    let stats = result.context("duplicate report failed")?;
    info!(
        kind = %kind,
        duplicate_keys = stats.duplicate_keys,
        duplicate_ids = stats.duplicate_ids,
        failed_lookups = stats.failed_lookups,
        "report written"
    );
    Ok(())
}

pub fn reset(config: &Config, kind: Kind) -> Result<()> {
    let store = open_store(config, kind, true)?;
    store.close().context("failed to close store")?;
    info!(kind = %kind, path = %store.path().display(), "store reset");
    Ok(())
}

pub fn stats(config: &Config, kind: Kind) -> Result<()> {
    let store = open_store(config, kind, false)?;
    let stats = store.stats();
    store.close().context("failed to close store")?;
    print_json(&stats.context("failed to read store stats")?)
}
