#![cfg_attr(not(test), no_std)]
#![allow(unused_unsafe)]
//! Single-threaded reference-counted pointers with explicit control over where the reference
//! count lives.
//!
//! Both pointers own a heap-allocated value jointly with all of their clones, and drop the value
//! (then free its storage) exactly when the last clone goes away:
//!
//! - [`SharedBox`] keeps the reference count and the value in one allocation.
//! - [`SplitBox`] allocates the reference count separately, which lets it adopt a value that is
//!   already boxed.
//!
//! Unlike `std::rc::Rc`, both pointers have an empty state. A pointer becomes empty when it is
//! created with `empty()` or `Default`, [`take`](ReferenceCounted::take)n from, or
//! [`reset`](ReferenceCounted::reset). Dereferencing an empty pointer panics,
//! [`try_get`](ReferenceCounted::try_get) reports it as [`Error::Empty`] instead.
//!
//! ```
//! use shared_box::{ReferenceCounted, SharedBox};
//!
//! let a = SharedBox::new(42);
//! let b = a.clone();
//! assert_eq!(SharedBox::reference_count(&b), 2);
//! assert!(SharedBox::ptr_eq(&a, &b));
//!
//! drop(a);
//! assert_eq!(*b, 42);
//! assert_eq!(SharedBox::reference_count(&b), 1);
//! ```
extern crate alloc;

use core::ops::Deref;

mod control;
mod error;
mod raw;

pub use error::Error;

/// A smart pointer that keeps track of how many pointers refer to the same allocation and
/// exposes this information in its API.
///
/// Besides cloning and dropping, only [`assign`](ReferenceCounted::assign) and
/// [`reset`](ReferenceCounted::reset) touch the reference count.
pub trait ReferenceCounted<T>: Clone + Default + Deref<Target = T> {
    /// Moves `value` into a new allocation, aborting through
    /// [`handle_alloc_error`](alloc::alloc::handle_alloc_error) if it cannot be allocated.
    fn new(value: T) -> Self {
        raw::or_abort(Self::try_new(value))
    }

    /// Moves `value` into a new allocation. On failure `value` is dropped.
    fn try_new(value: T) -> Result<Self, Error> {
        Self::try_new_with(|| Ok(value))
    }

    /// Allocates the storage first and then runs `init` to produce the value.
    ///
    /// If `init` fails or panics, the storage is freed before the failure propagates.
    fn try_new_with<E, F>(init: F) -> Result<Self, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<Error>;

    /// Get the number of owning pointers referring to the same allocation, `0` if `this` is
    /// empty.
    fn reference_count(this: &Self) -> usize;

    /// Returns `true` if both pointers share the same allocation, or both are empty.
    fn ptr_eq(this: &Self, other: &Self) -> bool;

    /// A raw pointer to the value, null if `this` is empty.
    fn as_ptr(this: &Self) -> *const T;

    /// The value, or [`Error::Empty`].
    fn try_get(this: &Self) -> Result<&T, Error>;

    /// A mutable reference to the value if `this` is its only owner.
    fn get_mut(this: &mut Self) -> Option<&mut T>;

    /// Returns the value if `this` is its only owner, and `this` otherwise.
    ///
    /// The storage is freed without dropping the value.
    fn try_unwrap(this: Self) -> Result<T, Self>;

    /// `true` for default, taken and reset pointers.
    fn is_empty(this: &Self) -> bool {
        Self::reference_count(this) == 0
    }

    /// Moves the reference out of `this` and leaves `this` empty. The count is unchanged.
    fn take(this: &mut Self) -> Self {
        core::mem::take(this)
    }

    /// Releases the reference held by `this` now, leaving `this` empty.
    fn reset(this: &mut Self) {
        *this = Self::default();
    }

    /// Makes `this` share the value of `source`.
    ///
    /// The old reference is released before the new one is acquired; assigning a pointer that
    /// already shares `source`'s allocation does nothing.
    fn assign(this: &mut Self, source: &Self) {
        if Self::ptr_eq(this, source) {
            return;
        }
        Self::reset(this);
        *this = source.clone();
    }
}

/// Comparison, formatting, hashing and conversions shared by both pointer layouts.
///
/// Comparisons look at the values, never at the addresses. An empty pointer only equals another
/// empty pointer and orders before every value.
macro_rules! impl_value_traits {
    ($ptr:ident) => {
        impl<T> core::ops::Deref for $ptr<T> {
            type Target = T;

            /// # Panics
            ///
            /// Panics if the pointer is empty.
            #[inline]
            fn deref(&self) -> &T {
                match <$ptr<T> as $crate::ReferenceCounted<T>>::try_get(self) {
                    Ok(value) => value,
                    Err(err) => panic!("{}", err),
                }
            }
        }

        impl<T> Default for $ptr<T> {
            /// Creates an empty pointer.
            fn default() -> Self {
                $ptr::empty()
            }
        }

        impl<T> core::borrow::Borrow<T> for $ptr<T> {
            /// # Panics
            ///
            /// Panics if the pointer is empty. Keyed collections that are searched by `&T`
            /// must not hold empty pointers.
            fn borrow(&self) -> &T {
                &**self
            }
        }

        impl<T> AsRef<T> for $ptr<T> {
            fn as_ref(&self) -> &T {
                &**self
            }
        }

        impl<T> From<T> for $ptr<T> {
            fn from(value: T) -> Self {
                <$ptr<T> as $crate::ReferenceCounted<T>>::new(value)
            }
        }

        impl<T: core::fmt::Display> core::fmt::Display for $ptr<T> {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                match <$ptr<T> as $crate::ReferenceCounted<T>>::try_get(self) {
                    Ok(value) => core::fmt::Display::fmt(value, f),
                    Err(_) => f.write_str("<empty>"),
                }
            }
        }

        impl<T: core::fmt::Debug> core::fmt::Debug for $ptr<T> {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                match <$ptr<T> as $crate::ReferenceCounted<T>>::try_get(self) {
                    Ok(value) => core::fmt::Debug::fmt(value, f),
                    Err(_) => f.write_str("<empty>"),
                }
            }
        }

        impl<T> core::fmt::Pointer for $ptr<T> {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                let ptr = <$ptr<T> as $crate::ReferenceCounted<T>>::as_ptr(self);
                core::fmt::Pointer::fmt(&ptr, f)
            }
        }

        impl<T: PartialEq> PartialEq for $ptr<T> {
            #[inline]
            fn eq(&self, other: &$ptr<T>) -> bool {
                use $crate::ReferenceCounted;
                $ptr::try_get(self).ok() == $ptr::try_get(other).ok()
            }
        }

        impl<T: Eq> Eq for $ptr<T> {}

        impl<T: PartialOrd> PartialOrd for $ptr<T> {
            fn partial_cmp(&self, other: &$ptr<T>) -> Option<core::cmp::Ordering> {
                use $crate::ReferenceCounted;
                $ptr::try_get(self).ok().partial_cmp(&$ptr::try_get(other).ok())
            }
        }

        impl<T: Ord> Ord for $ptr<T> {
            fn cmp(&self, other: &$ptr<T>) -> core::cmp::Ordering {
                use $crate::ReferenceCounted;
                $ptr::try_get(self).ok().cmp(&$ptr::try_get(other).ok())
            }
        }

        impl<T: core::hash::Hash> core::hash::Hash for $ptr<T> {
            /// Hashes the value exactly like `T` does, so lookups through `Borrow<T>` work. An
            /// empty pointer hashes nothing.
            fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
                use $crate::ReferenceCounted;
                if let Ok(value) = $ptr::try_get(self) {
                    value.hash(state)
                }
            }
        }

        impl<T> Unpin for $ptr<T> {}
    };
}

#[cfg(feature = "combined")]
mod shared;
#[cfg(feature = "combined")]
pub use shared::*;

#[cfg(feature = "split")]
mod split;
#[cfg(feature = "split")]
pub use split::*;
