use super::concurrent_map::{ConcurrentMap, Reclaimer};
use super::descriptor::{Describe, Descriptor};
use super::list::HMList;
use crate::config::map::DsConfig;
use crate::error::{Error, Result};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Michael's hash map: a fixed table of Harris-Michael list buckets.
pub struct HashMap<K, V, R> {
    buckets: Vec<HMList<K, V, R>>,
}

impl<K, V, R> HashMap<K, V, R>
where
    K: Ord + Hash + Send,
    V: Send,
    R: Reclaimer,
{
    /// Fails with a configuration error if `n` is 0.
    pub fn with_capacity(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(Error::config("ds.buckets", n, "must be > 0"));
        }
        let mut buckets = Vec::with_capacity(n);
        for _ in 0..n {
            buckets.push(HMList::new());
        }

        Ok(HashMap { buckets })
    }

    #[inline]
    pub fn get_bucket(&self, index: usize) -> &HMList<K, V, R> {
        unsafe { self.buckets.get_unchecked(index % self.buckets.len()) }
    }

    // NOTE: truncates the 64-bit hash on 32-bit targets.
    #[inline]
    fn hash(k: &K) -> usize {
        let mut s = DefaultHasher::new();
        k.hash(&mut s);
        s.finish() as usize
    }

    pub fn get(&self, k: &K, guard: &R::Guard) -> Option<V>
    where
        V: Clone,
    {
        let i = Self::hash(k);
        self.get_bucket(i).get(k, guard)
    }

    pub fn insert(&self, k: K, v: V, guard: &R::Guard) -> bool {
        let i = Self::hash(&k);
        self.get_bucket(i).insert(k, v, guard)
    }

    pub fn remove(&self, k: &K, guard: &R::Guard) -> Option<V> {
        let i = Self::hash(k);
        self.get_bucket(i).remove(k, guard)
    }
}

impl<K, V, R: Reclaimer> Describe for HashMap<K, V, R> {
    fn descriptor() -> Descriptor {
        Descriptor::new("harris_michael_hash_map").with_reclaimer(R::descriptor())
    }
}

impl<R: Reclaimer> ConcurrentMap for HashMap<u64, u64, R> {
    type Guard = R::Guard;

    fn new(ds: &DsConfig) -> Result<Self> {
        Self::with_capacity(ds.buckets)
    }

    #[inline]
    fn region_guard() -> R::Guard {
        R::pin()
    }

    #[inline]
    fn try_emplace(&self, key: u64, guard: &R::Guard) -> bool {
        self.insert(key, key, guard)
    }

    #[inline]
    fn try_remove(&self, key: u64, guard: &R::Guard) -> bool {
        self.remove(&key, guard).is_some()
    }

    #[inline]
    fn try_get(&self, key: u64, guard: &R::Guard) -> bool {
        self.get(&key, guard).is_some()
    }
}
