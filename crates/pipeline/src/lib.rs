pub mod dedup;
pub mod error;
pub mod error_log;
pub mod executor;
pub mod importer;
pub mod job;
pub mod reader;
pub mod reporter;

pub use dedup::{Accepted, DedupProcessor, DedupStats};
pub use error::PipelineError;
pub use error_log::ErrorLog;
pub use executor::{Executor, ExecutorStats, Processor};
pub use importer::{import_existing, ExistingStateImporter, ImportStats};
pub use job::{provenance_id, CandidateRecord, Job};
pub use reader::{InputFormat, RecordReader, DEFAULT_IDENTITY_FIELD};
pub use reporter::{report, DuplicateReportRecord, ReportStats};
