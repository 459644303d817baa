use std::sync::atomic::AtomicPtr;

use super::descriptor::Describe;
use crate::config::map::DsConfig;
use crate::error::Result;

/// What the benchmark requires from a map under test.
///
/// Every sequence of operations must happen while the calling thread holds a
/// guard obtained from `region_guard`. The guard is per-thread and marks the
/// thread as active for the map's reclamation scheme until it is dropped.
pub trait ConcurrentMap: Send + Sync + 'static {
    type Guard;

    /// Builds an empty map, rejecting a `ds` it cannot be built from.
    fn new(ds: &DsConfig) -> Result<Self>
    where
        Self: Sized;
    fn region_guard() -> Self::Guard;
    /// Inserts `key -> key`. Fails if the key is present.
    fn try_emplace(&self, key: u64, guard: &Self::Guard) -> bool;
    fn try_remove(&self, key: u64, guard: &Self::Guard) -> bool;
    fn try_get(&self, key: u64, guard: &Self::Guard) -> bool;
}

/// A memory reclamation scheme for structures linked by raw atomic
/// pointers.
///
/// A node may only be dereferenced after it was protected through a shield
/// and validated against the link it was loaded from. Unlinked nodes are
/// handed to `retire` and freed once no shield of any thread covers them.
pub trait Reclaimer: Describe + Send + Sync + 'static {
    /// Marks the thread as participating for a region of operations.
    type Guard;
    /// Protects one node at a time.
    type Shield;

    fn pin() -> Self::Guard;
    fn shield(guard: &Self::Guard) -> Self::Shield;
    /// Protects `ptr`, which was loaded from `src`, then reloads `src`.
    ///
    /// `Err` carries the current value of `src` when it no longer equals
    /// `ptr` (tag included); the protection is then not valid.
    fn try_protect<T>(
        shield: &mut Self::Shield,
        ptr: *mut T,
        src: &AtomicPtr<T>,
    ) -> Result<(), *mut T>;
    /// Hands over a node that has been unlinked from the structure.
    ///
    /// # Safety
    ///
    /// `ptr` must be an untagged pointer obtained from `Box::into_raw`. It
    /// must be unreachable for operations that start after this call, and
    /// must not be retired twice.
    unsafe fn retire<T: Send>(guard: &Self::Guard, ptr: *mut T);
}
