//! Epoch-based reclamation on crossbeam-epoch's default collector.
//!
//! A thread registers with the collector the first time it pins and stays
//! registered until it exits. Threads only hold a pin for the duration of a
//! region guard, so a registered but idle thread never holds back the epoch.

use crossbeam_epoch::{Guard, Shared};
use std::sync::atomic::AtomicPtr;

use super::concurrent_map::Reclaimer;
use super::descriptor::{Describe, Descriptor};

#[derive(Debug, Clone, Copy, Default)]
pub struct Ebr;

impl Describe for Ebr {
    fn descriptor() -> Descriptor {
        Descriptor::new("epoch_based")
    }
}

impl Reclaimer for Ebr {
    type Guard = Guard;
    type Shield = ();

    #[inline]
    fn pin() -> Guard {
        crossbeam_epoch::pin()
    }

    #[inline]
    fn shield(_: &Guard) {}

    /// The pinned guard already covers every node reachable during the
    /// region.
    #[inline]
    fn try_protect<T>(_: &mut (), _: *mut T, _: &AtomicPtr<T>) -> Result<(), *mut T> {
        Ok(())
    }

    #[inline]
    unsafe fn retire<T: Send>(guard: &Guard, ptr: *mut T) {
        guard.defer_destroy(Shared::from(ptr as *const T));
    }
}

pub type HMList<K, V> = super::list::HMList<K, V, Ebr>;
pub type HashMap<K, V> = super::michael_hash_map::HashMap<K, V, Ebr>;
