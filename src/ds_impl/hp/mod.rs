//! Hazard pointers.
//!
//! Unlike the epoch-based scheme, participation does not hold back
//! reclamation as a whole: a thread only protects the nodes its shields
//! currently publish, and every dereference is preceded by a validated
//! protection.

mod domain;

use std::marker::PhantomData;
use std::sync::atomic::AtomicPtr;

pub use self::domain::{do_reclamation, HazardPointer};

use super::concurrent_map::Reclaimer;
use super::descriptor::{Describe, Descriptor};

#[derive(Debug, Clone, Copy, Default)]
pub struct Hp;

/// Registration of the calling thread with the hazard pointer domain.
#[derive(Debug)]
pub struct HpGuard {
    _marker: PhantomData<*const ()>,
}

impl Describe for Hp {
    fn descriptor() -> Descriptor {
        Descriptor::new("hazard_pointer")
    }
}

impl Reclaimer for Hp {
    type Guard = HpGuard;
    type Shield = HazardPointer;

    #[inline]
    fn pin() -> HpGuard {
        domain::register();
        HpGuard {
            _marker: PhantomData,
        }
    }

    #[inline]
    fn shield(_: &HpGuard) -> HazardPointer {
        HazardPointer::new()
    }

    #[inline]
    fn try_protect<T>(
        shield: &mut HazardPointer,
        ptr: *mut T,
        src: &AtomicPtr<T>,
    ) -> Result<(), *mut T> {
        shield.try_protect(ptr, src)
    }

    #[inline]
    unsafe fn retire<T: Send>(_: &HpGuard, ptr: *mut T) {
        domain::retire(ptr);
    }
}

pub type HMList<K, V> = super::list::HMList<K, V, Hp>;
pub type HashMap<K, V> = super::michael_hash_map::HashMap<K, V, Hp>;
