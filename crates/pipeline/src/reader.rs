//! Reads candidate records from import input files.
//!
//! Inputs are files or directories (walked recursively, in sorted order,
//! hidden entries skipped). Every record becomes a [`Job`] carrying the file
//! name and the record's 1-based position. Records that cannot be parsed are
//! still yielded, with the error attached, so they are counted and logged
//! like any other failure.

use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::job::{provenance_id, CandidateRecord, Job};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// One identity per line. Blank lines and `#` comments are skipped.
    #[default]
    Lines,
    /// One JSON object per line.
    Json,
    /// A stream of YAML documents separated by `---`.
    Yaml,
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InputFormat::Lines => "lines",
            InputFormat::Json => "json",
            InputFormat::Yaml => "yaml",
        })
    }
}

impl FromStr for InputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lines" | "txt" | "text" => Ok(InputFormat::Lines),
            "json" | "jsonl" => Ok(InputFormat::Json),
            "yaml" | "yml" => Ok(InputFormat::Yaml),
            other => Err(format!("unknown input format: {other}")),
        }
    }
}

type Records = Box<dyn Iterator<Item = Job<CandidateRecord>> + Send>;

/// Field holding the identity of structured records unless configured.
pub const DEFAULT_IDENTITY_FIELD: &str = "uri";

/// Which fields of a structured record carry its identity and its id.
///
/// Dots descend into nested objects (`meta.name`). Records without an id
/// field get their position in the input as id.
#[derive(Debug, Clone)]
struct Fields {
    identity: String,
    id: Option<String>,
}

/// Iterator over every record of every input file.
pub struct RecordReader {
    files: VecDeque<PathBuf>,
    format: InputFormat,
    fields: Fields,
    current: Option<Records>,
}

impl RecordReader {
    pub fn new(inputs: &[PathBuf], format: InputFormat) -> Self {
        let files = collect_files(inputs);
        debug!(files = files.len(), format = %format, "record reader ready");
        Self {
            files: files.into(),
            format,
            fields: Fields {
                identity: DEFAULT_IDENTITY_FIELD.to_string(),
                id: None,
            },
            current: None,
        }
    }

    pub fn identity_field(mut self, field: impl Into<String>) -> Self {
        self.fields.identity = field.into();
        self
    }

    pub fn id_field(mut self, field: impl Into<String>) -> Self {
        self.fields.id = Some(field.into());
        self
    }

    fn open(&self, path: PathBuf) -> Records {
        let origin = Origin::new(&path);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                let err = anyhow!(e).context(format!("cannot open {}", path.display()));
                return Box::new(std::iter::once(origin.failed(0, err)));
            }
        };

        match self.format {
            InputFormat::Lines => Box::new(read_lines(file, origin)),
            InputFormat::Json => Box::new(read_json_lines(file, origin, self.fields.clone())),
            InputFormat::Yaml => Box::new(read_yaml(file, origin, self.fields.clone())),
        }
    }
}

impl Iterator for RecordReader {
    type Item = Job<CandidateRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(records) = self.current.as_mut() {
                if let Some(job) = records.next() {
                    return Some(job);
                }
                self.current = None;
            }
            let path = self.files.pop_front()?;
            self.current = Some(self.open(path));
        }
    }
}

/// Where records come from. `source` is the path as given and is what logs
/// and the error log show; fallback ids use the canonical path so they do
/// not depend on how the input was spelled.
struct Origin {
    source: String,
    id_base: String,
}

impl Origin {
    fn new(path: &Path) -> Self {
        let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        Self {
            source: path.display().to_string(),
            id_base: canonical.display().to_string(),
        }
    }

    fn id(&self, record_number: u64) -> String {
        provenance_id(&self.id_base, record_number)
    }

    fn job(&self, candidate: CandidateRecord, record_number: u64) -> Job<CandidateRecord> {
        Job::new(candidate, self.source.clone(), record_number)
    }

    fn failed(&self, record_number: u64, error: anyhow::Error) -> Job<CandidateRecord> {
        let placeholder = CandidateRecord::from_identity(self.id(record_number), "");
        self.job(placeholder, record_number).with_error(error)
    }
}

fn collect_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .follow_links(true)
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else {
            // Missing files surface as a failed record when opened.
            files.push(input.clone());
        }
    }
    files
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

fn read_lines(file: File, origin: Origin) -> impl Iterator<Item = Job<CandidateRecord>> + Send {
    BufReader::new(file)
        .lines()
        .enumerate()
        .filter_map(move |(idx, line)| {
            let record_number = idx as u64 + 1;
            match line {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() || trimmed.starts_with('#') {
                        return None;
                    }
                    let candidate = CandidateRecord::from_identity(origin.id(record_number), trimmed);
                    Some(origin.job(candidate, record_number))
                }
                Err(e) => Some(origin.failed(record_number, anyhow!(e).context("unreadable line"))),
            }
        })
}

fn read_json_lines(
    file: File,
    origin: Origin,
    fields: Fields,
) -> impl Iterator<Item = Job<CandidateRecord>> + Send {
    BufReader::new(file)
        .lines()
        .enumerate()
        .filter_map(move |(idx, line)| {
            let record_number = idx as u64 + 1;
            let parsed = line.context("unreadable line").and_then(|line| {
                if line.trim().is_empty() {
                    Ok(None)
                } else {
                    serde_json::from_str::<serde_json::Value>(&line)
                        .map(Some)
                        .context("invalid JSON record")
                }
            });
            match parsed {
                Ok(None) => None,
                Ok(Some(value)) => Some(structured_job(value, &fields, &origin, record_number)),
                Err(e) => Some(origin.failed(record_number, e)),
            }
        })
}

fn read_yaml(
    file: File,
    origin: Origin,
    fields: Fields,
) -> impl Iterator<Item = Job<CandidateRecord>> + Send {
    let documents: Vec<Result<serde_json::Value, serde_yaml::Error>> =
        serde_yaml::Deserializer::from_reader(BufReader::new(file))
            .map(serde_json::Value::deserialize)
            .collect();

    documents
        .into_iter()
        .enumerate()
        .filter_map(move |(idx, doc)| {
            let record_number = idx as u64 + 1;
            match doc {
                Ok(serde_json::Value::Null) => None,
                Ok(value) => Some(structured_job(value, &fields, &origin, record_number)),
                Err(e) => Some(origin.failed(
                    record_number,
                    anyhow!(e).context("invalid YAML document"),
                )),
            }
        })
}

fn structured_job(
    value: serde_json::Value,
    fields: &Fields,
    origin: &Origin,
    record_number: u64,
) -> Job<CandidateRecord> {
    let id = fields
        .id
        .as_deref()
        .and_then(|f| field_str(&value, f))
        .map(str::to_string)
        .unwrap_or_else(|| origin.id(record_number));

    match field_str(&value, &fields.identity).map(str::to_string) {
        Some(identity) => origin.job(CandidateRecord::new(id, identity, value), record_number),
        None => {
            let err = anyhow!("record has no string field '{}'", fields.identity);
            origin
                .job(CandidateRecord::new(id, "", value), record_number)
                .with_error(err)
        }
    }
}

fn field_str<'v>(value: &'v serde_json::Value, field: &str) -> Option<&'v str> {
    field
        .split('.')
        .try_fold(value, |node, part| node.get(part))
        .and_then(|v| v.as_str())
}
