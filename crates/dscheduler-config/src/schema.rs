//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Shared default helper.
pub(crate) fn default_true() -> bool {
    true
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub runner: RunnerConfig,

    #[serde(default)]
    pub seed: SeedConfig,
}

/// Entry cache configuration, applied to both the job and trigger caches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries per cache.
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,

    /// Time-to-live from write, in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_max_entries() -> u64 {
    2000
}

fn default_ttl_secs() -> u64 {
    30 * 60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

/// How listings are windowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PagingMode {
    /// Window identities before loading detail whenever the sort and
    /// filter fields are known from the identity alone.
    #[default]
    Auto,
    /// Always load every record before sorting and windowing.
    LoadAll,
}

/// Listing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    /// Maximum number of concurrent detail loads per listing.
    #[serde(default = "default_load_concurrency")]
    pub load_concurrency: usize,

    #[serde(default)]
    pub paging: PagingMode,
}

fn default_page_size() -> usize {
    10
}

fn default_max_page_size() -> usize {
    500
}

fn default_load_concurrency() -> usize {
    16
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            load_concurrency: default_load_concurrency(),
            paging: PagingMode::default(),
        }
    }
}

/// Store backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    File,
    Memory,
}

/// Authoritative store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Storage directory for the file backend. Defaults to `~/.dscheduler/store`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Resolve the storage directory for the file backend.
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".dscheduler")
                .join("store")
        })
    }
}

/// Trigger-firing runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,

    /// A trigger later than this is reported as misfired.
    #[serde(default = "default_misfire_threshold_secs")]
    pub misfire_threshold_secs: u64,
}

fn default_check_interval_ms() -> u64 {
    1000
}

fn default_misfire_threshold_secs() -> u64 {
    60
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            check_interval_ms: default_check_interval_ms(),
            misfire_threshold_secs: default_misfire_threshold_secs(),
        }
    }
}

/// Demo job seeding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Seed on `run` startup.
    #[serde(default)]
    pub on_startup: bool,

    #[serde(default = "default_seed_groups")]
    pub groups: Vec<String>,

    #[serde(default = "default_jobs_per_group")]
    pub jobs_per_group: usize,

    #[serde(default = "default_start_number")]
    pub start_number: usize,

    #[serde(default = "default_seed_executable")]
    pub executable: String,

    #[serde(default = "default_seed_cron")]
    pub cron_expression: String,
}

fn default_seed_groups() -> Vec<String> {
    ["g2", "g3", "g4", "g5", "g6"]
        .iter()
        .map(|g| g.to_string())
        .collect()
}

fn default_jobs_per_group() -> usize {
    100
}

fn default_start_number() -> usize {
    200
}

fn default_seed_executable() -> String {
    "SampleJob".to_string()
}

fn default_seed_cron() -> String {
    "0 0 0/1 * * ?".to_string()
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            on_startup: false,
            groups: default_seed_groups(),
            jobs_per_group: default_jobs_per_group(),
            start_number: default_start_number(),
            executable: default_seed_executable(),
            cron_expression: default_seed_cron(),
        }
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
