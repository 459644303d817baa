//! Process-wide hazard pointer domain.
//!
//! Every participating thread owns a record of `SLOTS` hazard slots, taken
//! from a push-only list of records that are recycled after the thread
//! exits. Retired nodes go to a thread-local bag and are freed by a scan
//! once no slot of any record points to them.

use core::cell::{Cell, RefCell};
use core::marker::PhantomData;
use core::ptr;
use std::collections::HashSet;
use std::sync::atomic::{fence, AtomicBool, AtomicPtr, Ordering};

use crossbeam_utils::CachePadded;

use crate::ds_impl::tag::untagged;

/// Hazard slots per thread, i.e. shields a thread can hold at once.
pub(crate) const SLOTS: usize = 16;
const COUNTS_BETWEEN_COLLECT: usize = 128;

static DOMAIN: Domain = Domain::new();

thread_local! {
    static PARTICIPANT: Participant = Participant::new(&DOMAIN);
}

struct Domain {
    records: AtomicPtr<HazardRecord>,
    /// Bags left behind by exited threads.
    orphans: RetiredList,
}

struct HazardRecord {
    next: *const HazardRecord,
    available: AtomicBool,
    slots: [CachePadded<AtomicPtr<u8>>; SLOTS],
}

#[derive(Debug, Clone, Copy)]
struct Retired {
    ptr: *mut u8,
    deleter: unsafe fn(ptr: *mut u8),
}

// Only built from `T: Send` in `retire`.
unsafe impl Send for Retired {}

impl Retired {
    fn new<T: Send>(ptr: *mut T) -> Self {
        Self {
            ptr: ptr as *mut u8,
            deleter: free::<T>,
        }
    }
}

unsafe fn free<T>(ptr: *mut u8) {
    drop(Box::from_raw(ptr as *mut T))
}

impl Domain {
    const fn new() -> Self {
        Self {
            records: AtomicPtr::new(ptr::null_mut()),
            orphans: RetiredList::new(),
        }
    }

    fn acquire(&'static self) -> &'static HazardRecord {
        let mut cur = self.records.load(Ordering::Acquire);
        while let Some(cur_ref) = unsafe { cur.as_ref() } {
            if cur_ref.available.load(Ordering::Relaxed)
                && cur_ref
                    .available
                    .compare_exchange(true, false, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                return cur_ref;
            }
            cur = cur_ref.next.cast_mut();
        }

        let new = Box::leak(Box::new(HazardRecord {
            next: ptr::null(),
            available: AtomicBool::new(false),
            slots: core::array::from_fn(|_| CachePadded::new(AtomicPtr::new(ptr::null_mut()))),
        }));
        let mut head = self.records.load(Ordering::Relaxed);
        loop {
            new.next = head;
            match self
                .records
                .compare_exchange(head, new, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return new,
                Err(head_new) => head = head_new,
            }
        }
    }

    fn protected(&self) -> HashSet<*mut u8> {
        let mut protected = HashSet::new();
        let mut cur = self.records.load(Ordering::Acquire);
        while let Some(cur_ref) = unsafe { cur.as_ref() } {
            for slot in &cur_ref.slots {
                let ptr = slot.load(Ordering::Acquire);
                if !ptr.is_null() {
                    protected.insert(ptr);
                }
            }
            cur = cur_ref.next.cast_mut();
        }
        protected
    }
}

/// Push-only stack of retired bags.
struct RetiredList {
    head: AtomicPtr<RetiredListNode>,
}

struct RetiredListNode {
    retireds: Vec<Retired>,
    next: *mut RetiredListNode,
}

impl RetiredList {
    const fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    fn push(&self, retireds: Vec<Retired>) {
        let new = Box::leak(Box::new(RetiredListNode {
            retireds,
            next: ptr::null_mut(),
        }));

        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            new.next = head;
            match self
                .head
                .compare_exchange(head, new, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(head_new) => head = head_new,
            }
        }
    }

    fn pop_all(&self) -> Vec<Retired> {
        let mut cur = self.head.swap(ptr::null_mut(), Ordering::Acquire);
        let mut retireds = Vec::new();
        while !cur.is_null() {
            let mut cur_box = unsafe { Box::from_raw(cur) };
            retireds.append(&mut cur_box.retireds);
            cur = cur_box.next;
        }
        retireds
    }
}

struct Participant {
    domain: &'static Domain,
    record: &'static HazardRecord,
    /// Bit `i` is set while slot `i` is not held by a shield.
    free: Cell<u32>,
    retired: RefCell<Vec<Retired>>,
}

impl Participant {
    const ALL_FREE: u32 = (1u32 << SLOTS) - 1;

    fn new(domain: &'static Domain) -> Self {
        Self {
            domain,
            record: domain.acquire(),
            free: Cell::new(Self::ALL_FREE),
            retired: RefCell::new(Vec::new()),
        }
    }

    fn acquire_slot(&self) -> usize {
        let free = self.free.get();
        assert!(free != 0, "a thread holds more than {SLOTS} hazard pointers");
        let idx = free.trailing_zeros() as usize;
        self.free.set(free & !(1u32 << idx));
        idx
    }

    fn release_slot(&self, idx: usize) {
        self.free.set(self.free.get() | (1u32 << idx));
    }

    fn retire(&self, retired: Retired) {
        let count = {
            let mut bag = self.retired.borrow_mut();
            bag.push(retired);
            bag.len()
        };
        if count % COUNTS_BETWEEN_COLLECT == 0 {
            self.do_reclamation();
        }
    }

    fn do_reclamation(&self) {
        // Every node in the bag must be retired before the fence.
        let mut bag = self.retired.borrow_mut();
        bag.append(&mut self.domain.orphans.pop_all());

        // Pairs with the fence in `HazardPointer::try_protect`: a slot
        // published before that fence is visible to the scan below.
        fence(Ordering::SeqCst);
        let protected = self.domain.protected();
        bag.retain(|r| {
            if protected.contains(&r.ptr) {
                true
            } else {
                unsafe { (r.deleter)(r.ptr) };
                false
            }
        });
    }
}

impl Drop for Participant {
    fn drop(&mut self) {
        self.do_reclamation();
        let left = self.retired.take();
        if !left.is_empty() {
            self.domain.orphans.push(left);
        }
        for slot in &self.record.slots {
            slot.store(ptr::null_mut(), Ordering::Release);
        }
        self.record.available.store(true, Ordering::Release);
    }
}

/// Registers the calling thread with the domain.
pub(crate) fn register() {
    PARTICIPANT.with(|_| ());
}

/// Retires `ptr` in the calling thread's bag.
///
/// # Safety
///
/// See `Reclaimer::retire`.
pub(crate) unsafe fn retire<T: Send>(ptr: *mut T) {
    let retired = Retired::new(ptr);
    if PARTICIPANT.try_with(|p| p.retire(retired)).is_err() {
        // The thread is exiting: leave it to the next scan of another thread.
        DOMAIN.orphans.push(vec![retired]);
    }
}

/// Frees every retired node that is not protected, including the bags of
/// exited threads.
pub fn do_reclamation() {
    PARTICIPANT.with(|p| p.do_reclamation());
}

/// One hazard slot of the calling thread.
#[derive(Debug)]
pub struct HazardPointer {
    slot: &'static AtomicPtr<u8>,
    idx: usize,
    _marker: PhantomData<*const ()>,
}

impl HazardPointer {
    pub fn new() -> Self {
        PARTICIPANT.with(|p| {
            let idx = p.acquire_slot();
            let record: &'static HazardRecord = p.record;
            Self {
                slot: &*record.slots[idx],
                idx,
                _marker: PhantomData,
            }
        })
    }

    #[inline]
    pub fn protect_raw<T>(&mut self, ptr: *mut T) {
        self.slot.store(untagged(ptr) as *mut u8, Ordering::Release);
    }

    #[inline]
    pub fn reset_protection(&mut self) {
        self.slot.store(ptr::null_mut(), Ordering::Release);
    }

    /// Protects `ptr` and checks that `src` still holds it. If not, returns
    /// the current value of `src`.
    #[inline]
    pub fn try_protect<T>(&mut self, ptr: *mut T, src: &AtomicPtr<T>) -> Result<(), *mut T> {
        self.protect_raw(ptr);
        fence(Ordering::SeqCst);
        let new = src.load(Ordering::Acquire);
        if new == ptr {
            Ok(())
        } else {
            Err(new)
        }
    }
}

impl Default for HazardPointer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HazardPointer {
    fn drop(&mut self) {
        self.reset_protection();
        let _ = PARTICIPANT.try_with(|p| p.release_slot(self.idx));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    static FREED: AtomicUsize = AtomicUsize::new(0);

    struct Tracked(u64);

    impl Drop for Tracked {
        fn drop(&mut self) {
            FREED.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn protected_node_outlives_scans() {
        let node = Box::into_raw(Box::new(Tracked(1)));
        let src = AtomicPtr::new(node);
        assert_eq!(unsafe { (*node).0 }, 1);

        let mut hp = HazardPointer::new();
        assert!(hp.try_protect(node, &src).is_ok());
        src.store(ptr::null_mut(), Ordering::Release);

        let before = FREED.load(Ordering::SeqCst);
        unsafe { retire(node) };
        do_reclamation();
        assert_eq!(FREED.load(Ordering::SeqCst), before);

        drop(hp);
        do_reclamation();
        assert_eq!(FREED.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn changed_source_fails_validation() {
        let mut a = 1u64;
        let mut b = 2u64;
        let pa: *mut u64 = &mut a;
        let pb: *mut u64 = &mut b;
        let src = AtomicPtr::new(pa);
        let mut hp = HazardPointer::new();
        assert_eq!(hp.try_protect(pb, &src), Err(pa));
        assert_eq!(hp.try_protect(pa, &src), Ok(()));
    }

    #[test]
    fn slots_are_recycled() {
        for _ in 0..4 * SLOTS {
            let _shields: Vec<HazardPointer> = (0..SLOTS).map(|_| HazardPointer::new()).collect();
        }
    }
}
