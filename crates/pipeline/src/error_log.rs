//! JSONL log of failed jobs, written by the executor's error handler.
//!
//! Each line carries the record's source and position plus the record
//! itself, so the log doubles as input for reprocessing just the failures.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::error::PipelineError;
use crate::job::Job;

#[derive(Serialize)]
struct ErrorEntry<'a, P> {
    source: &'a str,
    record_number: u64,
    payload: &'a P,
    error: String,
    failed_at: DateTime<Utc>,
}

pub struct ErrorLog<W: Write> {
    writer: W,
    written: u64,
}

impl ErrorLog<BufWriter<File>> {
    /// Create (or truncate) the log file, creating parent directories.
    pub fn create(path: &Path) -> Result<Self, PipelineError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> ErrorLog<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Append a failed job. The error chain is flattened into one message.
    pub fn record<P: Serialize>(&mut self, job: &Job<P>) -> Result<(), PipelineError> {
        let error = match &job.error {
            Some(e) => format!("{e:#}"),
            None => "unknown error".to_string(),
        };
        let entry = ErrorEntry {
            source: &job.source,
            record_number: job.record_number,
            payload: &job.payload,
            error,
            failed_at: Utc::now(),
        };
        serde_json::to_writer(&mut self.writer, &entry)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Like [`ErrorLog::record`], but a write failure is only logged. Used
    /// from error handlers, which have nowhere to return an error to.
    pub fn record_or_warn<P: Serialize>(&mut self, job: &Job<P>) {
        if let Err(e) = self.record(job) {
            warn!(
                source = %job.source,
                record_number = job.record_number,
                error = %e,
                "could not write error log entry"
            );
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> Result<(), PipelineError> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(mut self) -> Result<W, PipelineError> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}
