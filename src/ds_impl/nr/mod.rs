//! No reclamation: unlinked nodes are never freed, not even when the
//! structure is dropped. Serves as the baseline that reclamation overhead is
//! measured against.

use std::sync::atomic::AtomicPtr;

use super::concurrent_map::Reclaimer;
use super::descriptor::{Describe, Descriptor};

#[derive(Debug, Clone, Copy, Default)]
pub struct Nr;

/// Marks a participating thread. Carries no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct NrGuard;

impl Describe for Nr {
    fn descriptor() -> Descriptor {
        Descriptor::new("no_reclamation")
    }
}

impl Reclaimer for Nr {
    type Guard = NrGuard;
    type Shield = ();

    #[inline]
    fn pin() -> NrGuard {
        NrGuard
    }

    #[inline]
    fn shield(_: &NrGuard) {}

    #[inline]
    fn try_protect<T>(_: &mut (), _: *mut T, _: &AtomicPtr<T>) -> Result<(), *mut T> {
        Ok(())
    }

    #[inline]
    unsafe fn retire<T: Send>(_: &NrGuard, _: *mut T) {}
}

pub type HMList<K, V> = super::list::HMList<K, V, Nr>;
pub type HashMap<K, V> = super::michael_hash_map::HashMap<K, V, Nr>;
