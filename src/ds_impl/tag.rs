use core::mem;

/// Unused least significant bits of an aligned pointer to `T`.
#[inline]
const fn low_bits<T>() -> usize {
    (1 << mem::align_of::<T>().trailing_zeros()) - 1
}

#[inline]
pub fn tagged<T>(ptr: *mut T, tag: usize) -> *mut T {
    ((ptr as usize & !low_bits::<T>()) | (tag & low_bits::<T>())) as *mut T
}

#[inline]
pub fn decompose_ptr<T>(ptr: *mut T) -> (*mut T, usize) {
    let ptr = ptr as usize;
    let raw = (ptr & !low_bits::<T>()) as *mut T;
    let tag = ptr & low_bits::<T>();
    (raw, tag)
}

#[inline]
pub fn untagged<T>(ptr: *mut T) -> *mut T {
    decompose_ptr(ptr).0
}

#[inline]
pub fn tag<T>(ptr: *mut T) -> usize {
    decompose_ptr(ptr).1
}
