use super::concurrent_map::{ConcurrentMap, Reclaimer};
use super::descriptor::{Describe, Descriptor};
use super::tag::{decompose_ptr, tag, tagged};
use crate::config::map::DsConfig;
use crate::error::Result;

use std::cmp::Ordering::{Equal, Greater, Less};
use std::marker::PhantomData;
use std::mem::{self, ManuallyDrop};
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

#[derive(Debug)]
struct Node<K, V> {
    /// Mark: tag 1
    next: AtomicPtr<Node<K, V>>,
    key: K,
    value: ManuallyDrop<V>,
}

pub struct List<K, V, R> {
    head: AtomicPtr<Node<K, V>>,
    _marker: PhantomData<(Box<Node<K, V>>, R)>,
}

impl<K, V, R> Default for List<K, V, R>
where
    K: Ord + Send,
    V: Send,
    R: Reclaimer,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, R> Drop for List<K, V, R> {
    fn drop(&mut self) {
        unsafe {
            let mut curr = self.head.load(Ordering::Relaxed);

            while !curr.is_null() {
                let mut node = Box::from_raw(curr);
                let (next, next_tag) = decompose_ptr(node.next.load(Ordering::Relaxed));
                // A marked node's value has been handed out by `remove`.
                if next_tag == 0 {
                    ManuallyDrop::drop(&mut node.value);
                }
                curr = next;
            }
        }
    }
}

struct Cursor<'g, K, V, R: Reclaimer> {
    prev: &'g AtomicPtr<Node<K, V>>,
    prev_shield: R::Shield,
    curr: *mut Node<K, V>,
    curr_shield: R::Shield,
}

impl<'g, K, V, R: Reclaimer> Cursor<'g, K, V, R> {
    fn new(head: &'g AtomicPtr<Node<K, V>>, guard: &R::Guard) -> Self {
        Self {
            prev: head,
            prev_shield: R::shield(guard),
            curr: ptr::null_mut(),
            curr_shield: R::shield(guard),
        }
    }
}

/// Sets the mark of `link`. Returns the unmarked successor, or `None` if
/// another thread marked it first.
fn mark<T>(link: &AtomicPtr<T>) -> Option<*mut T> {
    let mut next = link.load(Ordering::Acquire);
    loop {
        if tag(next) != 0 {
            return None;
        }
        match link.compare_exchange_weak(next, tagged(next, 1), Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => return Some(next),
            Err(current) => next = current,
        }
    }
}

impl<K, V, R> List<K, V, R>
where
    K: Ord + Send,
    V: Send,
    R: Reclaimer,
{
    pub fn new() -> Self {
        List {
            head: AtomicPtr::new(ptr::null_mut()),
            _marker: PhantomData,
        }
    }

    /// Positions `cursor` at the first node whose key is not less than
    /// `key`, unlinking marked nodes on the way. Returns whether the key was
    /// found, or `Err` if the traversal has to restart from the head.
    #[inline]
    fn find_inner<'g>(
        &'g self,
        key: &K,
        cursor: &mut Cursor<'g, K, V, R>,
        guard: &R::Guard,
    ) -> Result<bool, ()> {
        cursor.prev = &self.head;
        cursor.curr = self.head.load(Ordering::Acquire);

        loop {
            debug_assert_eq!(tag(cursor.curr), 0);

            if cursor.curr.is_null() {
                return Ok(false);
            }
            // Validating against an unmarked `prev` proves `curr` was
            // still linked after the shield was published.
            R::try_protect(&mut cursor.curr_shield, cursor.curr, cursor.prev).map_err(|_| ())?;

            let curr_node = unsafe { &*cursor.curr };
            let (next_base, next_tag) = decompose_ptr(curr_node.next.load(Ordering::Acquire));

            if next_tag == 0 {
                match curr_node.key.cmp(key) {
                    Less => {
                        cursor.prev = &curr_node.next;
                        mem::swap(&mut cursor.prev_shield, &mut cursor.curr_shield);
                    }
                    Equal => return Ok(true),
                    Greater => return Ok(false),
                }
            } else if cursor
                .prev
                .compare_exchange(cursor.curr, next_base, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                unsafe { R::retire(guard, cursor.curr) };
            } else {
                return Err(());
            }
            cursor.curr = next_base;
        }
    }

    fn find<'g>(&'g self, key: &K, cursor: &mut Cursor<'g, K, V, R>, guard: &R::Guard) -> bool {
        loop {
            if let Ok(found) = self.find_inner(key, cursor, guard) {
                return found;
            }
        }
    }

    pub fn get(&self, key: &K, guard: &R::Guard) -> Option<V>
    where
        V: Clone,
    {
        let mut cursor = Cursor::new(&self.head, guard);
        if self.find(key, &mut cursor, guard) {
            // `curr` stays protected until the cursor is dropped.
            Some(unsafe { (*(*cursor.curr).value).clone() })
        } else {
            None
        }
    }

    pub fn insert(&self, key: K, value: V, guard: &R::Guard) -> bool {
        let node = Box::into_raw(Box::new(Node {
            next: AtomicPtr::new(ptr::null_mut()),
            key,
            value: ManuallyDrop::new(value),
        }));
        let mut cursor = Cursor::new(&self.head, guard);

        loop {
            if self.find(unsafe { &(*node).key }, &mut cursor, guard) {
                unsafe {
                    let mut node = Box::from_raw(node);
                    ManuallyDrop::drop(&mut node.value);
                }
                return false;
            }

            unsafe { &*node }.next.store(cursor.curr, Ordering::Relaxed);
            if cursor
                .prev
                .compare_exchange(cursor.curr, node, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }

    pub fn remove(&self, key: &K, guard: &R::Guard) -> Option<V> {
        let mut cursor = Cursor::new(&self.head, guard);
        loop {
            if !self.find(key, &mut cursor, guard) {
                return None;
            }

            let curr_node = unsafe { &*cursor.curr };
            let next = match mark(&curr_node.next) {
                Some(next) => next,
                None => continue,
            };

            // The mark makes this thread the only one to take the value.
            let value = unsafe { ptr::read(&curr_node.value) };

            if cursor
                .prev
                .compare_exchange(cursor.curr, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                unsafe { R::retire(guard, cursor.curr) };
            }

            return Some(ManuallyDrop::into_inner(value));
        }
    }
}

/// Harris-Michael list used directly as a map.
pub struct HMList<K, V, R> {
    inner: List<K, V, R>,
}

impl<K, V, R> HMList<K, V, R>
where
    K: Ord + Send,
    V: Send,
    R: Reclaimer,
{
    pub fn new() -> Self {
        HMList { inner: List::new() }
    }

    #[inline]
    pub fn get(&self, key: &K, guard: &R::Guard) -> Option<V>
    where
        V: Clone,
    {
        self.inner.get(key, guard)
    }

    #[inline]
    pub fn insert(&self, key: K, value: V, guard: &R::Guard) -> bool {
        self.inner.insert(key, value, guard)
    }

    #[inline]
    pub fn remove(&self, key: &K, guard: &R::Guard) -> Option<V> {
        self.inner.remove(key, guard)
    }
}

impl<K, V, R> Default for HMList<K, V, R>
where
    K: Ord + Send,
    V: Send,
    R: Reclaimer,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, R: Reclaimer> Describe for HMList<K, V, R> {
    fn descriptor() -> Descriptor {
        Descriptor::new("harris_michael_list").with_reclaimer(R::descriptor())
    }
}

impl<R: Reclaimer> ConcurrentMap for HMList<u64, u64, R> {
    type Guard = R::Guard;

    fn new(_: &DsConfig) -> Result<Self> {
        Ok(HMList::new())
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
