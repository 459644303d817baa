//! Mixed insert/remove/get workload against a shared concurrent map.

use crossbeam_utils::thread::scope;
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{error, info};

use super::execution::{simulate_workload, Benchmark, ExecutionThread};
use super::report::{MixedData, ThreadReport};
use crate::config::map::{BenchmarkConfig, ExecutionConfig, ThreadConfig, MIXED_THREAD};
use crate::ds_impl::{ConcurrentMap, Describe, Descriptor};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Insert,
    Remove,
    Get,
}

/// Cut points over the full `u64` range of the random stream.
///
/// A draw `r` is an insert if `r < insert`, a remove if
/// `insert <= r < remove`, and a get otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    insert: u64,
    remove: u64,
}

impl Thresholds {
    pub fn from_ratios(insert_ratio: f64, remove_ratio: f64) -> Result<Self> {
        check_ratio("remove_ratio", remove_ratio)?;
        check_ratio("insert_ratio", insert_ratio)?;

        let update_ratio = remove_ratio + insert_ratio;
        if update_ratio > 1.0 {
            return Err(Error::config(
                "insert_ratio + remove_ratio",
                update_ratio,
                "the sum of remove_ratio and insert_ratio must be <= 1.0",
            ));
        }

        let insert = scale(insert_ratio);
        Ok(Self {
            insert,
            remove: scale(update_ratio).max(insert),
        })
    }

    #[inline]
    pub fn insert(&self) -> u64 {
        self.insert
    }

    #[inline]
    pub fn remove(&self) -> u64 {
        self.remove
    }

    #[inline]
    pub fn classify(&self, r: u64) -> Op {
        if r < self.insert {
            Op::Insert
        } else if r < self.remove {
            Op::Remove
        } else {
            Op::Get
        }
    }
}

fn check_ratio(param: &'static str, ratio: f64) -> Result<()> {
    // Also rejects NaN.
    if (0.0..=1.0).contains(&ratio) {
        Ok(())
    } else {
        Err(Error::config(param, ratio, "must be >= 0.0 and <= 1.0"))
    }
}

fn scale(ratio: f64) -> u64 {
    if ratio <= 0.0 {
        return 0;
    }
    // The cast saturates at u64::MAX. A positive ratio never rounds down to
    // an empty range.
    ((ratio * u64::MAX as f64) as u64).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadKind {
    Mixed,
}

impl FromStr for ThreadKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            MIXED_THREAD => Ok(ThreadKind::Mixed),
            _ => Err(Error::UnsupportedThreadType(s.to_string())),
        }
    }
}

/// Resolved parameters of a mixed workload thread.
#[derive(Debug, Clone, Copy, PartialEq)]
struct MixedParams {
    key_range: u64,
    thresholds: Thresholds,
    batch_size: u32,
    workload: u32,
}

impl MixedParams {
    fn new(config: &ThreadConfig, default_key_range: u64) -> Result<Self> {
        let key_range = config.key_range.unwrap_or(default_key_range);
        if key_range == 0 {
            return Err(Error::config("key_range", key_range, "must be > 0"));
        }
        if config.batch_size == 0 {
            return Err(Error::config("batch_size", config.batch_size, "must be > 0"));
        }
        Ok(Self {
            key_range,
            thresholds: Thresholds::from_ratios(config.insert_ratio, config.remove_ratio)?,
            batch_size: config.batch_size,
            workload: config.workload,
        })
    }
}

/// Checks the benchmark parameters and every thread group without building
/// a map, so a bad configuration fails before any variant is set up.
pub fn validate_config(benchmark: &BenchmarkConfig, execution: &ExecutionConfig) -> Result<()> {
    if benchmark.key_range == 0 {
        return Err(Error::config("key_range", 0, "must be > 0"));
    }
    for group in &execution.threads {
        match group.kind.parse::<ThreadKind>()? {
            ThreadKind::Mixed => MixedParams::new(group, benchmark.key_range)?,
        };
    }
    Ok(())
}

/// Inserts `count` keys evenly spaced over `[0, key_range)`.
///
/// Runs on a dedicated thread that is joined before returning, so the
/// calling thread never participates in the map's reclamation scheme.
/// Quiescent-state based schemes in particular would stall for good on a
/// registered thread that never passes a quiescent state.
pub fn prefill<M: ConcurrentMap + Describe>(map: &M, key_range: u64, count: u64) -> Result<()> {
    if count == 0 {
        return Ok(());
    }
    let step = key_range / count;

    // The outcome travels back through `join`, which orders it after every
    // write of the prefill thread.
    let outcome = scope(|s| {
        s.spawn(|_| {
            let guard = M::region_guard();
            let mut key = 0;
            for inserted in 0..count {
                if !map.try_emplace(key, &guard) {
                    return Err((key, inserted));
                }
                key += step;
            }
            Ok(())
        })
        .join()
    });

    match outcome {
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(Ok(Err((key, inserted)))) => Err(Error::Initialization {
            variant: M::descriptor().name(),
            key,
            inserted,
            requested: count,
        }),
        Ok(Err(_)) | Err(_) => Err(Error::PrefillPanicked(M::descriptor().name())),
    }
}

/// Owns the map shared by all workload threads.
pub struct HashMapBenchmark<M> {
    map: M,
    key_range: u64,
    seed: Option<u64>,
}

impl<M> HashMapBenchmark<M>
where
    M: ConcurrentMap + Describe,
{
    /// Builds the map and prefills it. On failure no benchmark is returned
    /// and the partially filled map is dropped.
    pub fn setup(config: &BenchmarkConfig) -> Result<Self> {
        if config.key_range == 0 {
            return Err(Error::config("key_range", 0, "must be > 0"));
        }

        let map = M::new(&config.ds)?;
        let prefill_count = config.prefill();
        let variant = M::descriptor().name();
        info!(%variant, key_range = config.key_range, prefill = prefill_count, "prefilling");

        if let Err(err) = prefill(&map, config.key_range, prefill_count) {
            error!(%variant, %err, "prefill failed");
            return Err(err);
        }

        Ok(Self {
            map,
            key_range: config.key_range,
            seed: config.seed,
        })
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn create_mixed_thread(
        &self,
        id: u32,
        config: &ThreadConfig,
    ) -> Result<MixedThread<'_, M>> {
        let rng = match self.seed {
            Some(seed) => SmallRng::seed_from_u64(seed.wrapping_add(id as u64)),
            None => SmallRng::from_entropy(),
        };
        self.create_mixed_thread_with_rng(id, config, rng)
    }

    pub fn create_mixed_thread_with_rng<R: RngCore>(
        &self,
        id: u32,
        config: &ThreadConfig,
        rng: R,
    ) -> Result<MixedThread<'_, M, R>> {
        match config.kind.parse::<ThreadKind>()? {
            ThreadKind::Mixed => MixedThread::new(&self.map, id, self.key_range, config, rng),
        }
    }
}

impl<M> Benchmark for HashMapBenchmark<M>
where
    M: ConcurrentMap + Describe,
{
    fn descriptor(&self) -> Descriptor {
        M::descriptor()
    }

    fn create_thread<'b>(
        &'b self,
        id: u32,
        config: &ThreadConfig,
    ) -> Result<Box<dyn ExecutionThread + 'b>> {
        Ok(Box::new(self.create_mixed_thread(id, config)?))
    }
}

/// A worker drawing one random number per operation.
///
/// Counters are only written by `run`, which needs `&mut self`; reading a
/// report therefore cannot overlap with a running batch.
pub struct MixedThread<'b, M, R = SmallRng> {
    id: u32,
    map: &'b M,
    params: MixedParams,
    rng: R,
    runtime: Duration,
    insert_operations: u32,
    remove_operations: u32,
    get_operations: u32,
}

impl<'b, M, R> MixedThread<'b, M, R>
where
    M: ConcurrentMap,
    R: RngCore,
{
    pub fn new(
        map: &'b M,
        id: u32,
        default_key_range: u64,
        config: &ThreadConfig,
        rng: R,
    ) -> Result<Self> {
        Ok(Self {
            id,
            map,
            params: MixedParams::new(config, default_key_range)?,
            rng,
            runtime: Duration::ZERO,
            insert_operations: 0,
            remove_operations: 0,
            get_operations: 0,
        })
    }

    pub fn key_range(&self) -> u64 {
        self.params.key_range
    }

    /// Executes one batch inside a single region guard.
    pub fn run(&mut self) {
        let start = Instant::now();
        let map = self.map;
        let params = self.params;

        let mut insert = 0u32;
        let mut remove = 0u32;
        let mut get = 0u32;

        let guard = M::region_guard();
        for _ in 0..params.batch_size {
            let r = self.rng.next_u64();
            let key = r % params.key_range;

            match params.thresholds.classify(r) {
                Op::Insert => {
                    if map.try_emplace(key, &guard) {
                        insert += 1;
                    }
                }
                Op::Remove => {
                    if map.try_remove(key, &guard) {
                        remove += 1;
                    }
                }
                Op::Get => {
                    if map.try_get(key, &guard) {
                        get += 1;
                    }
                }
            }

            simulate_workload(params.workload);
        }
        drop(guard);

        self.insert_operations = self.insert_operations.saturating_add(insert);
        self.remove_operations = self.remove_operations.saturating_add(remove);
        self.get_operations = self.get_operations.saturating_add(get);
        self.runtime += start.elapsed();
    }

    pub fn report(&self) -> ThreadReport {
        ThreadReport::new(
            self.id,
            MixedData {
                runtime: self.runtime.as_secs_f64() * 1000.0,
                insert: self.insert_operations,
                remove: self.remove_operations,
                get: self.get_operations,
            },
        )
    }
}

impl<'b, M, R> ExecutionThread for MixedThread<'b, M, R>
where
    M: ConcurrentMap,
    R: RngCore + Send,
{
    fn id(&self) -> u32 {
        self.id
    }

    fn run(&mut self) {
        MixedThread::run(self)
    }

    fn report(&self) -> ThreadReport {
        MixedThread::report(self)
    }
}
