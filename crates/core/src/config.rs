use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::kind::Kind;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key).as_deref() {
        Some("1") | Some("true") | Some("yes") => true,
        Some("0") | Some("false") | Some("no") => false,
        _ => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `SEENKEY_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("SEENKEY_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            storage: StorageConfig::from_env_profiled(p),
            pipeline: PipelineConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  storage:  data_dir={}, context={}, compaction={}s, sync_writes={}",
            self.storage.data_dir.display(),
            self.storage.context,
            self.storage.compaction_interval_secs,
            self.storage.sync_writes
        );
        tracing::info!(
            "  pipeline: workers={}, progress_interval={}",
            self.pipeline.workers,
            self.pipeline.progress_interval
        );
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Name of the remote installation the stores belong to. Keeps stores
    /// for different remote systems apart under the same data dir.
    pub context: String,
    pub compaction_interval_secs: u64,
    pub sync_writes: bool,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            data_dir: PathBuf::from(profiled_env_or(p, "DATA_DIR", "data")),
            context: profiled_env_or(p, "SEENKEY_CONTEXT", "default"),
            compaction_interval_secs: profiled_env_u64(p, "COMPACTION_INTERVAL_SECS", 300),
            sync_writes: profiled_env_bool(p, "STORE_SYNC_WRITES", true),
        }
    }

    /// Directory holding the dedup store for one kind: `{data_dir}/{context}/{kind}`.
    pub fn store_dir(&self, kind: Kind) -> PathBuf {
        self.data_dir.join(&self.context).join(kind.as_str())
    }

    pub fn compaction_interval(&self) -> Duration {
        Duration::from_secs(self.compaction_interval_secs.max(1))
    }
}

// ── Pipeline ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Worker count for the job executor.
    pub workers: usize,
    /// Log progress every this many processed items.
    pub progress_interval: u64,
}

impl PipelineConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            workers: profiled_env_u64(p, "SEENKEY_WORKERS", 32).max(1) as usize,
            progress_interval: profiled_env_u64(p, "PROGRESS_INTERVAL", 10_000).max(1),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 32,
            progress_interval: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(data_dir: &str, context: &str) -> StorageConfig {
        StorageConfig {
            data_dir: PathBuf::from(data_dir),
            context: context.to_string(),
            compaction_interval_secs: 0,
            sync_writes: true,
        }
    }

    #[test]
    fn store_dir_is_per_context_and_kind() {
        let cfg = storage("/var/lib/seenkey", "prod");
        assert_eq!(cfg.store_dir(Kind::Seed), PathBuf::from("/var/lib/seenkey/prod/seed"));
        assert_eq!(
            cfg.store_dir(Kind::CrawlEntity),
            PathBuf::from("/var/lib/seenkey/prod/crawlEntity")
        );
    }

    #[test]
    fn compaction_interval_is_never_zero() {
        assert_eq!(storage("d", "c").compaction_interval(), Duration::from_secs(1));
    }

    #[test]
    fn profiled_lookup_prefers_prefixed_key() {
        // Unique names so parallel tests never observe each other's vars.
        env::set_var("SEENKEY_TEST_KEY_A", "plain");
        env::set_var("STAGE_SEENKEY_TEST_KEY_A", "staged");
        assert_eq!(profiled_env_or("STAGE", "SEENKEY_TEST_KEY_A", "x"), "staged");
        assert_eq!(profiled_env_or("", "SEENKEY_TEST_KEY_A", "x"), "plain");
        assert_eq!(profiled_env_or("OTHER", "SEENKEY_TEST_KEY_A", "x"), "plain");
        assert_eq!(profiled_env_or("OTHER", "SEENKEY_TEST_KEY_MISSING", "x"), "x");
    }

    #[test]
    fn bool_parsing_falls_back_to_default() {
        env::set_var("SEENKEY_TEST_BOOL", "no");
        assert!(!profiled_env_bool("", "SEENKEY_TEST_BOOL", true));
        env::set_var("SEENKEY_TEST_BOOL_JUNK", "maybe");
        assert!(profiled_env_bool("", "SEENKEY_TEST_BOOL_JUNK", true));
    }
}
