use alloc::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use core::mem;
use core::ptr::NonNull;

use log::debug;

use crate::Error;

/// Allocates uninitialized storage for a `T`.
///
/// Zero-sized types get a dangling, well-aligned pointer and no allocation.
pub(crate) fn allocate<T>() -> Result<NonNull<T>, Error> {
    let layout = Layout::new::<T>();
    if layout.size() == 0 {
        return Ok(NonNull::dangling());
    }

    // Layout::new always satisfies the alignment of `T`, and the size is non-zero.
    let ptr = unsafe { alloc(layout) };
    NonNull::new(ptr.cast::<T>()).ok_or_else(|| Error::alloc(layout))
}

/// Frees storage obtained from [`allocate`]. The `T` in it must already be dropped.
///
/// # Safety
///
/// `ptr` must come from `allocate::<T>()` and must not have been freed yet.
pub(crate) unsafe fn deallocate<T>(ptr: NonNull<T>) {
    let layout = Layout::new::<T>();
    if layout.size() != 0 {
        unsafe { dealloc(ptr.as_ptr().cast(), layout) };
    }
}

/// Turns the error of an infallible constructor into the allocator's failure handler.
pub(crate) fn or_abort<T>(result: Result<T, Error>) -> T {
    match result {
        Ok(value) => value,
        Err(Error::Alloc { size, align }) => match Layout::from_size_align(size, align) {
            Ok(layout) => handle_alloc_error(layout),
            Err(_) => panic!("allocation failed"),
        },
        Err(Error::Empty) => unreachable!("constructors never produce empty pointers"),
    }
}

/// Storage that is freed again unless it is [`commit`](Pending::commit)ted.
///
/// Covers the window between allocating a block and having fully initialized it, so a failing
/// (or panicking) initializer never leaks the block.
pub(crate) struct Pending<T> {
    ptr: NonNull<T>,
}

impl<T> Pending<T> {
    pub(crate) fn new() -> Result<Self, Error> {
        allocate::<T>().map(|ptr| Pending { ptr })
    }

    pub(crate) fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Gives up the rollback; the caller now owns the storage.
    pub(crate) fn commit(self) -> NonNull<T> {
        let ptr = self.ptr;
        mem::forget(self);
        ptr
    }
}

impl<T> Drop for Pending<T> {
    fn drop(&mut self) {
        debug!(
            "rolling back {} byte allocation at {:p}",
            mem::size_of::<T>(),
            self.ptr
        );
        unsafe { deallocate(self.ptr) };
    }
}
