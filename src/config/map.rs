//! Configuration of the hash map benchmark.
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration. Unknown fields are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

pub const DEFAULT_KEY_RANGE: u64 = 2048;
pub const DEFAULT_BUCKETS: usize = 4096;
pub const DEFAULT_RATIO: f64 = 0.2;
pub const DEFAULT_BATCH_SIZE: u32 = 100;
pub const DEFAULT_RUNTIME_MS: u64 = 10_000;
pub const MIXED_THREAD: &str = "mixed";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Variant names to run. Empty means every registered variant.
    pub variants: Vec<String>,
    pub benchmark: BenchmarkConfig,
    pub execution: ExecutionConfig,
}

impl Config {
    pub fn from_path(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Sub-configuration handed to the map constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DsConfig {
    pub buckets: usize,
}

impl Default for DsConfig {
    fn default() -> Self {
        Self {
            buckets: DEFAULT_BUCKETS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchmarkConfig {
    pub ds: DsConfig,
    /// Exclusive upper bound of generated keys.
    pub key_range: u64,
    /// Entries inserted before measurement. `None` means 10% of `key_range`.
    pub prefill: Option<u64>,
    /// Seed of the per-thread random streams. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            ds: DsConfig::default(),
            key_range: DEFAULT_KEY_RANGE,
            prefill: None,
            seed: None,
        }
    }
}

impl BenchmarkConfig {
    pub fn prefill(&self) -> u64 {
        // by default we prefill 10% of the configured key-range
        self.prefill.unwrap_or(self.key_range / 10)
    }
}

/// One group of identically configured worker threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThreadConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub count: u32,
    /// Overrides the benchmark-wide key range for this group.
    pub key_range: Option<u64>,
    pub insert_ratio: f64,
    pub remove_ratio: f64,
    /// Operations per call of `run`.
    pub batch_size: u32,
    /// Spin iterations simulated between two operations.
    pub workload: u32,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            kind: MIXED_THREAD.to_string(),
            count: 1,
            key_range: None,
            insert_ratio: DEFAULT_RATIO,
            remove_ratio: DEFAULT_RATIO,
            batch_size: DEFAULT_BATCH_SIZE,
            workload: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionConfig {
    pub runtime_ms: u64,
    /// When set, every thread runs exactly this many batches and
    /// `runtime_ms` is ignored.
    pub rounds: Option<u64>,
    pub threads: Vec<ThreadConfig>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            runtime_ms: DEFAULT_RUNTIME_MS,
            rounds: None,
            threads: vec![ThreadConfig::default()],
        }
    }
}

impl ExecutionConfig {
    pub fn runtime(&self) -> Duration {
        Duration::from_millis(self.runtime_ms)
    }

    pub fn thread_count(&self) -> usize {
        self.threads.iter().map(|t| t.count as usize).sum()
    }
}
