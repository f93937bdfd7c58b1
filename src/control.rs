use core::cell::Cell;

/// The shared reference count of one owned value.
///
/// Every pointer sharing a value points at the same `ControlBlock`, so its address doubles as
/// the identity of the shared ownership.
pub(crate) struct ControlBlock {
    strong: Cell<usize>,
}

impl ControlBlock {
    /// A control block for a freshly created owner.
    pub(crate) const fn new() -> Self {
        ControlBlock {
            strong: Cell::new(1),
        }
    }

    #[inline]
    pub(crate) fn count(&self) -> usize {
        self.strong.get()
    }

    #[inline]
    pub(crate) fn increment(&self) {
        let strong = self.count();

        // A live pointer guarantees a non-zero count. An overflow can only be reached by
        // `mem::forget`ing pointers, and continuing would end in a use-after-free.
        if strong == 0 || strong == usize::MAX {
            panic!("reference count overflow");
        }
        self.strong.set(strong + 1);
    }

    /// Returns `true` if this released the last reference.
    #[inline]
    pub(crate) fn decrement(&self) -> bool {
        let strong = self.count();
        debug_assert!(strong > 0, "released a dead control block");
        self.strong.set(strong - 1);
        strong == 1
    }
}
