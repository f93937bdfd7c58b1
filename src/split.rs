use alloc::boxed::Box;
use core::marker::PhantomData;
use core::mem;
use core::ptr::{self, NonNull};

use log::{debug, trace};

use crate::control::ControlBlock;
use crate::raw::{self, Pending};
use crate::{Error, ReferenceCounted};

/// A non-thread-safe reference-counted pointer that allocates the reference count separately
/// from the value.
///
/// This costs a second allocation per value, but allows taking over a value that already lives in
/// a [`Box`], see [`SplitBox::from_box`].
pub struct SplitBox<T> {
    parts: Option<Parts<T>>,
    phantom: PhantomData<T>,
}

struct Parts<T> {
    control: NonNull<ControlBlock>,
    value: NonNull<T>,
}

impl<T> Clone for Parts<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Parts<T> {}

impl<T> Parts<T> {
    #[inline]
    fn control(&self) -> &ControlBlock {
        unsafe { self.control.as_ref() }
    }
}

impl<T> SplitBox<T> {
    /// Creates an empty `SplitBox`, which owns nothing.
    pub const fn empty() -> Self {
        SplitBox {
            parts: None,
            phantom: PhantomData,
        }
    }

    fn from_parts(parts: Parts<T>) -> Self {
        trace!(
            "allocated split box, control block at {:p}, value at {:p}",
            parts.control,
            parts.value
        );
        SplitBox {
            parts: Some(parts),
            phantom: PhantomData,
        }
    }

    /// Takes ownership of an already boxed value, aborting through
    /// [`handle_alloc_error`](alloc::alloc::handle_alloc_error) if the control block cannot be
    /// allocated.
    pub fn from_box(value: Box<T>) -> Self {
        raw::or_abort(Self::try_from_box(value))
    }

    /// Takes ownership of an already boxed value. Only the control block is allocated.
    ///
    /// If that allocation fails, `value` is dropped and its box freed before the error is
    /// returned.
    pub fn try_from_box(value: Box<T>) -> Result<Self, Error> {
        let control = match raw::allocate::<ControlBlock>() {
            Ok(control) => control,
            Err(err) => {
                debug!("dropping adopted value, no control block: {}", err);
                return Err(err);
            }
        };
        unsafe { control.as_ptr().write(ControlBlock::new()) };

        // Box allocates with `Layout::new::<T>()` from the global allocator, which is exactly
        // what `raw::deallocate` releases later.
        let value = unsafe { NonNull::new_unchecked(Box::into_raw(value)) };
        Ok(Self::from_parts(Parts {
            control,
            value,
        }))
    }

    /// Drops one reference, tearing down both allocations if it was the last one.
    ///
    /// # Safety
    ///
    /// The caller must give up its reference: `parts` must not be used through it afterwards.
    unsafe fn release(parts: Parts<T>) {
        if !parts.control().decrement() {
            return;
        }

        trace!("destroying split value at {:p}", parts.value);
        unsafe {
            ptr::drop_in_place(parts.value.as_ptr());
            raw::deallocate(parts.value);
            raw::deallocate(parts.control);
        }
    }
}

impl<T> ReferenceCounted<T> for SplitBox<T> {
    fn try_new_with<E, F>(init: F) -> Result<Self, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<Error>,
    {
        // Each pending allocation is freed again if a later step fails.
        let control = Pending::<ControlBlock>::new()?;
        let value = Pending::<T>::new()?;
        let data = init()?;

        unsafe {
            control.as_ptr().write(ControlBlock::new());
            value.as_ptr().write(data);
        }
        Ok(Self::from_parts(Parts {
            control: control.commit(),
            value: value.commit(),
        }))
    }

    fn reference_count(this: &Self) -> usize {
        this.parts.as_ref().map_or(0, |parts| parts.control().count())
    }

    /// Compares the control blocks, which every clone shares.
    fn ptr_eq(this: &Self, other: &Self) -> bool {
        let control = |parts: &Option<Parts<T>>| parts.map(|parts| parts.control);
        control(&this.parts) == control(&other.parts)
    }

    fn as_ptr(this: &Self) -> *const T {
        this.parts.map_or(ptr::null(), |parts| parts.value.as_ptr() as *const T)
    }

    fn try_get(this: &Self) -> Result<&T, Error> {
        match &this.parts {
            Some(parts) => Ok(unsafe { parts.value.as_ref() }),
            None => Err(Error::Empty),
        }
    }

    fn get_mut(this: &mut Self) -> Option<&mut T> {
        if Self::reference_count(this) != 1 {
            return None;
        }
        this.parts.map(|parts| unsafe { &mut *parts.value.as_ptr() })
    }

    fn try_unwrap(this: Self) -> Result<T, Self> {
        let parts = match this.parts {
            Some(parts) if parts.control().count() == 1 => parts,
            _ => return Err(this),
        };
        mem::forget(this);
        unsafe {
            let value = ptr::read(parts.value.as_ptr());
            raw::deallocate(parts.value);
            raw::deallocate(parts.control);
            Ok(value)
        }
    }
}

impl<T> Clone for SplitBox<T> {
    /// Makes a clone of the `SplitBox` pointer.
    ///
    /// This creates another pointer to the same allocations, increasing the reference count.
    #[inline]
    fn clone(&self) -> SplitBox<T> {
        if let Some(parts) = &self.parts {
            parts.control().increment();
            trace!(
                "copied split box, control block at {:p}, {} references",
                parts.control,
                parts.control().count()
            );
        }
        SplitBox {
            parts: self.parts,
            phantom: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        SplitBox::assign(self, source)
    }
}

impl<T> Drop for SplitBox<T> {
    #[inline]
    fn drop(&mut self) {
        if let Some(parts) = self.parts.take() {
            unsafe { Self::release(parts) }
        }
    }
}

impl_value_traits!(SplitBox);
