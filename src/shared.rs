// The handle layout and the teardown order follow the standard library's Rc.

use core::marker::PhantomData;
use core::mem;
use core::ptr::{self, NonNull};

use log::trace;

use crate::control::ControlBlock;
use crate::raw::{self, Pending};
use crate::{Error, ReferenceCounted};

/// A non-thread-safe reference-counted pointer that stores the reference count and the value in
/// a single allocation.
///
/// Constructing a `SharedBox` costs one allocation, dropping the last clone one deallocation.
pub struct SharedBox<T> {
    ptr: Option<NonNull<SharedInner<T>>>,
    phantom: PhantomData<SharedInner<T>>,
}

// `repr(C)` pins the control block to the start of the allocation; the value follows at a
// fixed offset padded to its alignment.
#[repr(C)]
struct SharedInner<T> {
    control: ControlBlock,
    value: T,
}

impl<T> SharedBox<T> {
    /// Creates an empty `SharedBox`, which owns nothing.
    pub const fn empty() -> Self {
        SharedBox {
            ptr: None,
            phantom: PhantomData,
        }
    }

    fn from_inner(ptr: NonNull<SharedInner<T>>) -> Self {
        SharedBox {
            ptr: Some(ptr),
            phantom: PhantomData,
        }
    }

    #[inline]
    fn inner(&self) -> Option<&SharedInner<T>> {
        // While this pointer is alive the allocation is guaranteed to be valid.
        self.ptr.map(|ptr| unsafe { &*ptr.as_ptr() })
    }

    /// Drops one reference to `ptr`, tearing down the allocation if it was the last one.
    ///
    /// # Safety
    ///
    /// The caller must give up its reference: `ptr` must not be used through it afterwards.
    unsafe fn release(ptr: NonNull<SharedInner<T>>) {
        let inner = ptr.as_ptr();
        if !unsafe { (*inner).control.decrement() } {
            return;
        }

        trace!("destroying shared value at {:p}", inner);
        // The value goes first, the storage it lives in after.
        unsafe {
            ptr::drop_in_place(ptr::addr_of_mut!((*inner).value));
            raw::deallocate(ptr);
        }
    }
}

impl<T> ReferenceCounted<T> for SharedBox<T> {
    fn try_new_with<E, F>(init: F) -> Result<Self, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<Error>,
    {
        let block = Pending::<SharedInner<T>>::new()?;
        // Dropping `block` on the error (or unwind) path frees the allocation again.
        let value = init()?;

        let inner = block.as_ptr();
        unsafe {
            ptr::addr_of_mut!((*inner).control).write(ControlBlock::new());
            ptr::addr_of_mut!((*inner).value).write(value);
        }
        let ptr = block.commit();
        trace!("allocated shared box at {:p}", ptr);
        Ok(Self::from_inner(ptr))
    }

    fn reference_count(this: &Self) -> usize {
        this.inner().map_or(0, |inner| inner.control.count())
    }

    fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.ptr == other.ptr
    }

    fn as_ptr(this: &Self) -> *const T {
        match this.ptr {
            Some(ptr) => unsafe { ptr::addr_of!((*ptr.as_ptr()).value) },
            None => ptr::null(),
        }
    }

    fn try_get(this: &Self) -> Result<&T, Error> {
        this.inner().map(|inner| &inner.value).ok_or(Error::Empty)
    }

    fn get_mut(this: &mut Self) -> Option<&mut T> {
        if Self::reference_count(this) != 1 {
            return None;
        }
        // We know this to be uniquely owned, and `this` is borrowed mutably.
        this.ptr.map(|ptr| unsafe { &mut (*ptr.as_ptr()).value })
    }

    fn try_unwrap(this: Self) -> Result<T, Self> {
        if Self::reference_count(&this) != 1 {
            return Err(this);
        }

        let ptr = match this.ptr {
            Some(ptr) => ptr,
            None => return Err(this),
        };
        mem::forget(this);
        unsafe {
            let value = ptr::read(ptr::addr_of!((*ptr.as_ptr()).value));
            raw::deallocate(ptr);
            Ok(value)
        }
    }
}

impl<T> Clone for SharedBox<T> {
    /// Makes a clone of the `SharedBox` pointer.
    ///
    /// This creates another pointer to the same allocation, increasing the reference count.
    /// Cloning an empty pointer gives another empty pointer.
    #[inline]
    fn clone(&self) -> SharedBox<T> {
        if let Some(inner) = self.inner() {
            inner.control.increment();
            trace!(
                "copied shared box at {:p}, {} references",
                inner,
                inner.control.count()
            );
        }
        SharedBox {
            ptr: self.ptr,
            phantom: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        SharedBox::assign(self, source)
    }
}

impl<T> Drop for SharedBox<T> {
    /// Releases this reference. The last one drops the value, then frees the block.
    #[inline]
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            unsafe { Self::release(ptr) }
        }
    }
}

impl_value_traits!(SharedBox);
