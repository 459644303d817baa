pub mod execution;
pub mod hash_map;
pub mod registry;
pub mod report;

pub use self::execution::{execute, Benchmark, ExecutionThread};
pub use self::hash_map::{validate_config, HashMapBenchmark, MixedThread, Thresholds};
pub use self::registry::{BenchmarkBuilder, Registry};
pub use self::report::{MixedData, RunReport, ThreadReport};
