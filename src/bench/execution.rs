//! Creates, runs and joins the worker threads of a benchmark.

use crossbeam_utils::thread::scope;
use std::panic;
use std::sync::Barrier;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::report::{RunReport, ThreadReport};
use crate::config::map::{ExecutionConfig, ThreadConfig};
use crate::ds_impl::Descriptor;
use crate::error::Result;

/// A worker owned by exactly one OS thread while it runs.
pub trait ExecutionThread: Send {
    fn id(&self) -> u32;
    /// Executes one batch of operations.
    fn run(&mut self);
    fn report(&self) -> ThreadReport;
}

/// A set up benchmark that hands out worker threads.
pub trait Benchmark: Sync {
    fn descriptor(&self) -> Descriptor;
    fn create_thread<'b>(
        &'b self,
        id: u32,
        config: &ThreadConfig,
    ) -> Result<Box<dyn ExecutionThread + 'b>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCondition {
    Runtime(Duration),
    Rounds(u64),
}

impl From<&ExecutionConfig> for StopCondition {
    fn from(config: &ExecutionConfig) -> Self {
        match config.rounds {
            Some(rounds) => StopCondition::Rounds(rounds),
            None => StopCondition::Runtime(config.runtime()),
        }
    }
}

/// Delay between two operations, standing in for application work.
#[inline]
pub fn simulate_workload(iterations: u32) {
    for _ in 0..iterations {
        std::hint::spin_loop();
    }
}

/// Runs all thread groups of `config` against `benchmark`.
///
/// Every thread is created before any is spawned, so an invalid thread
/// configuration aborts the run without touching the benchmark.
pub fn execute(benchmark: &dyn Benchmark, config: &ExecutionConfig) -> Result<RunReport> {
    let mut threads = Vec::with_capacity(config.thread_count());
    let mut id = 0;
    for group in &config.threads {
        for _ in 0..group.count {
            threads.push(benchmark.create_thread(id, group)?);
            id += 1;
        }
    }

    let stop = StopCondition::from(config);
    let barrier = &Barrier::new(threads.len() + 1);
    info!(threads = threads.len(), ?stop, "starting threads");

    let (reports, runtime) = scope(|s| {
        let handles: Vec<_> = threads
            .into_iter()
            .map(|mut thread| {
                s.spawn(move |_| {
                    barrier.wait();
                    debug!(id = thread.id(), "thread started");
                    match stop {
                        StopCondition::Rounds(rounds) => {
                            for _ in 0..rounds {
                                thread.run();
                            }
                        }
                        StopCondition::Runtime(duration) => {
                            let start = Instant::now();
                            while start.elapsed() < duration {
                                thread.run();
                            }
                        }
                    }
                    thread.report()
                })
            })
            .collect();

        barrier.wait();
        let start = Instant::now();
        // Joining orders every counter update before the report is read.
        let reports: Vec<ThreadReport> = handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| panic::resume_unwind(e)))
            .collect();
        (reports, start.elapsed())
    })
    .unwrap_or_else(|e| panic::resume_unwind(e));

    for report in &reports {
        debug!(id = report.id, operations = report.operations, data = ?report.data, "thread finished");
    }
    Ok(RunReport::aggregate(benchmark.descriptor(), reports, runtime))
}
