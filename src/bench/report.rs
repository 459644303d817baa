use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

use crate::ds_impl::Descriptor;
use crate::error::Result;

/// Counters of one mixed workload thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MixedData {
    /// Time spent running batches, in milliseconds.
    pub runtime: f64,
    pub insert: u32,
    pub remove: u32,
    pub get: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadReport {
    pub id: u32,
    pub data: MixedData,
    pub operations: u64,
}

impl ThreadReport {
    pub fn new(id: u32, data: MixedData) -> Self {
        let operations = data.insert as u64 + data.remove as u64 + data.get as u64;
        Self {
            id,
            data,
            operations,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub insert: u64,
    pub remove: u64,
    pub get: u64,
    pub operations: u64,
}

/// Result of running one variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub variant: Descriptor,
    pub threads: Vec<ThreadReport>,
    pub totals: Totals,
    /// Wall-clock time of the measured phase, in milliseconds.
    pub runtime: f64,
    /// Successful operations per second.
    pub throughput: u64,
}

impl RunReport {
    pub fn aggregate(variant: Descriptor, threads: Vec<ThreadReport>, runtime: Duration) -> Self {
        let totals = threads.iter().fold(Totals::default(), |acc, t| Totals {
            insert: acc.insert + t.data.insert as u64,
            remove: acc.remove + t.data.remove as u64,
            get: acc.get + t.data.get as u64,
            operations: acc.operations + t.operations,
        });
        let secs = runtime.as_secs_f64();
        let throughput = if secs > 0.0 {
            (totals.operations as f64 / secs) as u64
        } else {
            0
        };
        Self {
            variant,
            threads,
            totals,
            runtime: runtime.as_secs_f64() * 1000.0,
            throughput,
        }
    }
}

/// Writes the reports of all variants of a run as a JSON array.
pub fn write_json(path: &Path, reports: &[RunReport]) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, reports)?;
    Ok(())
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} threads, ops/s: {}, ops: {} (insert: {}, remove: {}, get: {}), runtime: {:.1} ms",
            self.variant.name(),
            self.threads.len(),
            self.throughput,
            self.totals.operations,
            self.totals.insert,
            self.totals.remove,
            self.totals.get,
            self.runtime,
        )
    }
}
