use core::alloc::Layout;

use thiserror::Error;

/// Errors reported by the reference-counted pointers of this crate.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The global allocator refused to hand out the backing storage.
    #[error("failed to allocate {size} bytes aligned to {align}")]
    Alloc { size: usize, align: usize },

    /// The pointer is empty (default-constructed, taken from or reset).
    #[error("access through an empty pointer")]
    Empty,
}

impl Error {
    pub(crate) fn alloc(layout: Layout) -> Self {
        Error::Alloc {
            size: layout.size(),
            align: layout.align(),
        }
    }
}
