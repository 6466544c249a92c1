use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use seenkey_core::{Kind, NormalizeOptions};
use seenkey_pipeline::{InputFormat, DEFAULT_IDENTITY_FIELD};

/// Import deduplication against a persistent store of canonical keys.
///
/// Each kind of remote object has its own store under
/// `{data_dir}/{context}/{kind}`. Machine-readable output goes to stdout,
/// logs to stderr.
#[derive(Parser, Debug)]
#[command(name = "seenkey", version, about)]
pub struct CliArgs {
    /// Root directory for stores (overrides DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Store namespace inside the data directory (overrides SEENKEY_CONTEXT)
    #[arg(long, global = true)]
    pub context: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record the objects that already exist remotely, read from a JSONL dump
    ImportExisting(ImportExistingArgs),
    /// Run input records through the store, printing the new ones as JSON lines
    Import(ImportArgs),
    /// Print every canonical key owned by more than one object
    Report(ReportArgs),
    /// Wipe the store of a kind
    Reset(KindArg),
    /// Print entry counts of the store of a kind
    Stats(KindArg),
}

#[derive(Args, Debug)]
pub struct KindArg {
    /// Object kind: seed or crawlEntity
    #[arg(long)]
    pub kind: Kind,
}

#[derive(Args, Debug, Clone, Copy, Default)]
pub struct NormalizeArgs {
    /// Treat http and https (and the default port) as the same key
    #[arg(long)]
    pub ignore_scheme: bool,

    /// Reduce URIs to their host
    #[arg(long)]
    pub toplevel: bool,
}

impl NormalizeArgs {
    pub fn options(&self) -> NormalizeOptions {
        NormalizeOptions {
            ignore_scheme: self.ignore_scheme,
            toplevel: self.toplevel,
        }
    }
}

#[derive(Args, Debug)]
pub struct ImportExistingArgs {
    #[command(flatten)]
    pub kind: KindArg,

    /// JSONL dump of existing objects, one `{"id", "identity", ...}` per line
    #[arg(long)]
    pub from: PathBuf,

    /// Wipe the store before importing
    #[arg(long)]
    pub reset: bool,

    #[command(flatten)]
    pub normalize: NormalizeArgs,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    #[command(flatten)]
    pub kind: KindArg,

    /// Input files or directories
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Input format: lines, json or yaml
    #[arg(long, default_value_t = InputFormat::Lines)]
    pub format: InputFormat,

    /// Field of structured records holding the identity
    #[arg(long, default_value = DEFAULT_IDENTITY_FIELD)]
    pub field: String,

    /// Field of structured records holding the object id
    #[arg(long)]
    pub id_field: Option<String>,

    /// Worker count (overrides SEENKEY_WORKERS)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Write failed records to this JSONL file
    #[arg(long)]
    pub errors: Option<PathBuf>,

    #[command(flatten)]
    pub normalize: NormalizeArgs,
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    #[command(flatten)]
    pub kind: KindArg,

    /// JSONL dump used to resolve the ids of each duplicate
    #[arg(long)]
    pub objects: Option<PathBuf>,
}
