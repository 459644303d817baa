use rand::rngs::mock::StepRng;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread::{self, ThreadId};

use smr_hash_map_bench::bench::{execute, HashMapBenchmark, Registry};
use smr_hash_map_bench::config::map::{BenchmarkConfig, DsConfig, ExecutionConfig, ThreadConfig};
use smr_hash_map_bench::ds_impl::{ConcurrentMap, Describe, Descriptor};
use smr_hash_map_bench::{Error, Result};

static GUARD_THREADS: Mutex<Vec<ThreadId>> = Mutex::new(Vec::new());

/// Records its keys and the threads that opened a region.
#[derive(Default)]
struct RecordingMap {
    keys: Mutex<BTreeSet<u64>>,
}

struct RecordingGuard;

impl ConcurrentMap for RecordingMap {
    type Guard = RecordingGuard;

    fn new(_: &DsConfig) -> Result<Self> {
        Ok(Self::default())
    }
    fn region_guard() -> RecordingGuard {
        GUARD_THREADS.lock().unwrap().push(thread::current().id());
        RecordingGuard
    }
    fn try_emplace(&self, key: u64, _: &RecordingGuard) -> bool {
        self.keys.lock().unwrap().insert(key)
    }
    fn try_remove(&self, key: u64, _: &RecordingGuard) -> bool {
        self.keys.lock().unwrap().remove(&key)
    }
    fn try_get(&self, key: u64, _: &RecordingGuard) -> bool {
        self.keys.lock().unwrap().contains(&key)
    }
}

impl Describe for RecordingMap {
    fn descriptor() -> Descriptor {
        Descriptor::new("recording_map").with_reclaimer(Descriptor::new("none"))
    }
}

const FAIL_AT: u64 = 42;
static FAILING_DROPS: AtomicUsize = AtomicUsize::new(0);

/// Rejects the `FAIL_AT`-th insertion.
#[derive(Default)]
struct FailingMap {
    emplaced: AtomicU64,
}

impl Drop for FailingMap {
    fn drop(&mut self) {
        FAILING_DROPS.fetch_add(1, Ordering::SeqCst);
    }
}

impl ConcurrentMap for FailingMap {
    type Guard = ();

    fn new(_: &DsConfig) -> Result<Self> {
        Ok(Self::default())
    }
    fn region_guard() {}
    fn try_emplace(&self, _: u64, _: &()) -> bool {
        self.emplaced.fetch_add(1, Ordering::SeqCst) != FAIL_AT
    }
    fn try_remove(&self, _: u64, _: &()) -> bool {
        true
    }
    fn try_get(&self, _: u64, _: &()) -> bool {
        true
    }
}

impl Describe for FailingMap {
    fn descriptor() -> Descriptor {
        Descriptor::new("failing_map")
    }
}

static REGIONS: AtomicUsize = AtomicUsize::new(0);

/// Counts the regions opened on it. Used by a single test only.
struct RegionCountingMap;

impl ConcurrentMap for RegionCountingMap {
    type Guard = ();

    fn new(_: &DsConfig) -> Result<Self> {
        Ok(RegionCountingMap)
    }
    fn region_guard() {
        REGIONS.fetch_add(1, Ordering::SeqCst);
    }
    fn try_emplace(&self, _: u64, _: &()) -> bool {
        true
    }
    fn try_remove(&self, _: u64, _: &()) -> bool {
        true
    }
    fn try_get(&self, _: u64, _: &()) -> bool {
        true
    }
}

impl Describe for RegionCountingMap {
    fn descriptor() -> Descriptor {
        Descriptor::new("region_counting_map")
    }
}

/// Every operation succeeds.
struct AcceptingMap;

impl ConcurrentMap for AcceptingMap {
    type Guard = ();

    fn new(_: &DsConfig) -> Result<Self> {
        Ok(AcceptingMap)
    }
    fn region_guard() {}
    fn try_emplace(&self, _: u64, _: &()) -> bool {
        true
    }
    fn try_remove(&self, _: u64, _: &()) -> bool {
        true
    }
    fn try_get(&self, _: u64, _: &()) -> bool {
        true
    }
}

impl Describe for AcceptingMap {
    fn descriptor() -> Descriptor {
        Descriptor::new("accepting_map")
    }
}

#[test]
fn prefill_is_evenly_spaced() {
    let bench = HashMapBenchmark::<RecordingMap>::setup(&BenchmarkConfig {
        key_range: 1000,
        prefill: Some(100),
        ..BenchmarkConfig::default()
    })
    .unwrap();

    let keys = bench.map().keys.lock().unwrap();
    assert_eq!(keys.len(), 100);
    assert!(keys.iter().copied().eq((0..1000).step_by(10)));
}

#[test]
fn prefill_defaults_to_a_tenth_of_the_key_range() {
    let bench = HashMapBenchmark::<RecordingMap>::setup(&BenchmarkConfig::default()).unwrap();
    assert_eq!(bench.map().keys.lock().unwrap().len(), 204);
}

#[test]
fn prefill_runs_on_a_dedicated_thread() {
    let bench = HashMapBenchmark::<RecordingMap>::setup(&BenchmarkConfig {
        key_range: 100,
        prefill: Some(10),
        ..BenchmarkConfig::default()
    })
    .unwrap();
    assert_eq!(bench.map().keys.lock().unwrap().len(), 10);
    assert!(!GUARD_THREADS.lock().unwrap().contains(&thread::current().id()));
}

#[test]
fn one_region_for_prefill_and_one_per_batch() {
    let bench = HashMapBenchmark::<RegionCountingMap>::setup(&BenchmarkConfig {
        key_range: 1000,
        prefill: Some(100),
        ..BenchmarkConfig::default()
    })
    .unwrap();
    assert_eq!(REGIONS.load(Ordering::SeqCst), 1);

    let mut thread = bench
        .create_mixed_thread(0, &ThreadConfig::default())
        .unwrap();
    for batch in 1..=3 {
        thread.run();
        assert_eq!(REGIONS.load(Ordering::SeqCst), 1 + batch);
    }
    assert_eq!(thread.report().operations, 300);
}

#[test]
fn failed_prefill_yields_no_benchmark() {
    let drops = FAILING_DROPS.load(Ordering::SeqCst);
    let res = HashMapBenchmark::<FailingMap>::setup(&BenchmarkConfig {
        key_range: 1000,
        prefill: Some(100),
        ..BenchmarkConfig::default()
    });
    match res {
        Err(Error::Initialization {
            variant,
            key,
            inserted,
            requested,
        }) => {
            assert_eq!(variant, "failing_map");
            assert_eq!(inserted, FAIL_AT);
            assert_eq!(key, FAIL_AT * 10);
            assert_eq!(requested, 100);
        }
        Err(err) => panic!("unexpected error: {err}"),
        Ok(_) => panic!("setup must fail"),
    }
    // The partially filled map did not outlive setup.
    assert_eq!(FAILING_DROPS.load(Ordering::SeqCst), drops + 1);
}

#[test]
fn duplicate_prefill_key_fails_setup() {
    // key_range / prefill == 0: every prefill key is 0.
    let res = HashMapBenchmark::<RecordingMap>::setup(&BenchmarkConfig {
        key_range: 5,
        prefill: Some(10),
        ..BenchmarkConfig::default()
    });
    assert!(matches!(
        res,
        Err(Error::Initialization {
            key: 0,
            inserted: 1,
            ..
        })
    ));
}

#[test]
fn operations_add_up_to_threads_times_batch() {
    const THREADS: u32 = 8;
    const BATCH: u32 = 250;

    let bench = HashMapBenchmark::<AcceptingMap>::setup(&BenchmarkConfig::default()).unwrap();
    let config = ExecutionConfig {
        rounds: Some(1),
        threads: vec![ThreadConfig {
            count: THREADS,
            batch_size: BATCH,
            ..ThreadConfig::default()
        }],
        ..ExecutionConfig::default()
    };
    let report = execute(&bench, &config).unwrap();
    assert_eq!(report.threads.len(), THREADS as usize);
    assert_eq!(report.totals.operations, (THREADS * BATCH) as u64);
    for thread in &report.threads {
        assert_eq!(thread.operations, BATCH as u64);
    }
}

#[test]
fn mocked_stream_classification() {
    let bench = HashMapBenchmark::<AcceptingMap>::setup(&BenchmarkConfig::default()).unwrap();
    let config = ThreadConfig {
        insert_ratio: 0.3,
        remove_ratio: 0.3,
        ..ThreadConfig::default()
    };

    let mut zeros = bench
        .create_mixed_thread_with_rng(0, &config, StepRng::new(0, 0))
        .unwrap();
    zeros.run();
    zeros.run();
    let data = zeros.report().data;
    assert_eq!((data.insert, data.remove, data.get), (200, 0, 0));

    let mut maxes = bench
        .create_mixed_thread_with_rng(1, &config, StepRng::new(u64::MAX, 0))
        .unwrap();
    maxes.run();
    let data = maxes.report().data;
    assert_eq!((data.insert, data.remove, data.get), (0, 0, 100));
}

#[test]
fn unsupported_thread_type() {
    let bench = HashMapBenchmark::<AcceptingMap>::setup(&BenchmarkConfig::default()).unwrap();
    let config = ExecutionConfig {
        threads: vec![ThreadConfig {
            kind: "queue".to_string(),
            ..ThreadConfig::default()
        }],
        ..ExecutionConfig::default()
    };
    match execute(&bench, &config) {
        Err(Error::UnsupportedThreadType(kind)) => assert_eq!(kind, "queue"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn invalid_ratios_abort_before_running() {
    let bench = HashMapBenchmark::<AcceptingMap>::setup(&BenchmarkConfig::default()).unwrap();
    for (insert_ratio, remove_ratio, param) in [
        (0.5, 0.6, "insert_ratio + remove_ratio"),
        (0.0, 1.5, "remove_ratio"),
        (1.5, 0.0, "insert_ratio"),
    ] {
        let config = ExecutionConfig {
            threads: vec![ThreadConfig {
                insert_ratio,
                remove_ratio,
                ..ThreadConfig::default()
            }],
            ..ExecutionConfig::default()
        };
        match execute(&bench, &config) {
            Err(Error::Config { param: p, .. }) => assert_eq!(p, param),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}

#[test]
fn every_registered_variant_runs() {
    let registry = Registry::with_defaults();
    assert_eq!(registry.len(), 6);

    // Fully prefilled and read-only: every lookup hits.
    let benchmark = BenchmarkConfig {
        key_range: 512,
        prefill: Some(512),
        seed: Some(7),
        ..BenchmarkConfig::default()
    };
    let execution = ExecutionConfig {
        rounds: Some(10),
        threads: vec![ThreadConfig {
            count: 4,
            insert_ratio: 0.0,
            remove_ratio: 0.0,
            ..ThreadConfig::default()
        }],
        ..ExecutionConfig::default()
    };

    for name in registry.names() {
        let builder = registry.get(name).unwrap();
        let bench = builder.build(&benchmark).unwrap();
        let report = execute(bench.as_ref(), &execution).unwrap();
        assert_eq!(report.variant.name(), name);
        assert_eq!(report.totals.get, 4 * 10 * 100, "{name}");
        assert_eq!(report.totals.operations, 4 * 10 * 100, "{name}");
    }
}

#[test]
fn mixed_workload_on_real_maps() {
    let registry = Registry::with_defaults();
    let execution = ExecutionConfig {
        rounds: Some(50),
        threads: vec![ThreadConfig {
            count: 4,
            ..ThreadConfig::default()
        }],
        ..ExecutionConfig::default()
    };

    for name in registry.names() {
        let bench = registry
            .get(name)
            .unwrap()
            .build(&BenchmarkConfig::default())
            .unwrap();
        let report = execute(bench.as_ref(), &execution).unwrap();
        assert!(report.totals.operations <= 4 * 50 * 100, "{name}");
        assert!(report.totals.insert > 0, "{name}");
    }
}
