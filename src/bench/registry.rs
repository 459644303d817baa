//! Runtime registry of benchmark variants (map x reclamation scheme).

use std::collections::BTreeMap;
use std::marker::PhantomData;

use super::execution::Benchmark;
use super::hash_map::HashMapBenchmark;
use crate::config::map::BenchmarkConfig;
use crate::ds_impl::{ebr, hp, nr, ConcurrentMap, Describe, Descriptor};
use crate::error::{Error, Result};

/// Sets up a benchmark for one concrete map type.
pub trait BenchmarkBuilder: Send + Sync {
    fn descriptor(&self) -> Descriptor;
    fn build(&self, config: &BenchmarkConfig) -> Result<Box<dyn Benchmark>>;
}

struct TypedBuilder<M>(PhantomData<fn() -> M>);

impl<M> BenchmarkBuilder for TypedBuilder<M>
where
    M: ConcurrentMap + Describe,
{
    fn descriptor(&self) -> Descriptor {
        M::descriptor()
    }

    fn build(&self, config: &BenchmarkConfig) -> Result<Box<dyn Benchmark>> {
        Ok(Box::new(HashMapBenchmark::<M>::setup(config)?))
    }
}

#[derive(Default)]
pub struct Registry {
    builders: BTreeMap<String, Box<dyn BenchmarkBuilder>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every map with every reclamation scheme of this crate.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register::<ebr::HMList<u64, u64>>();
        registry.register::<hp::HMList<u64, u64>>();
        registry.register::<nr::HMList<u64, u64>>();
        registry.register::<ebr::HashMap<u64, u64>>();
        registry.register::<hp::HashMap<u64, u64>>();
        registry.register::<nr::HashMap<u64, u64>>();
        registry
    }

    /// Registers `M` under its descriptor name, replacing any previous entry.
    pub fn register<M: ConcurrentMap + Describe>(&mut self) {
        self.register_builder(Box::new(TypedBuilder::<M>(PhantomData)));
    }

    pub fn register_builder(&mut self, builder: Box<dyn BenchmarkBuilder>) {
        self.builders.insert(builder.descriptor().name(), builder);
    }

    pub fn get(&self, name: &str) -> Result<&dyn BenchmarkBuilder> {
        self.builders
            .get(name)
            .map(|b| b.as_ref())
            .ok_or_else(|| Error::UnknownVariant(name.to_string()))
    }

    /// Variant names in lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }
}
