//! A global allocator that counts what the current thread allocates and can be told to refuse an
//! upcoming allocation.
//!
//! The counters are thread-local, so tests running in parallel don't see each other.

#![allow(dead_code)]

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::ptr;

pub struct CountingAlloc;

#[global_allocator]
static ALLOC: CountingAlloc = CountingAlloc;

thread_local! {
    static LIVE: Cell<isize> = const { Cell::new(0) };
    static TOTAL: Cell<usize> = const { Cell::new(0) };
    // Number of allocations to let through before refusing one.
    static FAIL_AFTER: Cell<Option<usize>> = const { Cell::new(None) };
}

fn refuse() -> bool {
    FAIL_AFTER
        .try_with(|fail| match fail.get() {
            Some(0) => {
                fail.set(None);
                true
            }
            Some(n) => {
                fail.set(Some(n - 1));
                false
            }
            None => false,
        })
        .unwrap_or(false)
}

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if refuse() {
            return ptr::null_mut();
        }
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            let _ = LIVE.try_with(|live| live.set(live.get() + 1));
            let _ = TOTAL.try_with(|total| total.set(total.get() + 1));
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        let _ = LIVE.try_with(|live| live.set(live.get() - 1));
        System.dealloc(ptr, layout)
    }
}

/// Allocations made on this thread that have not been freed yet.
pub fn live() -> isize {
    LIVE.with(Cell::get)
}

/// Allocations made on this thread so far.
pub fn total() -> usize {
    TOTAL.with(Cell::get)
}

/// Lets `n` allocations succeed, then refuses the next one.
pub fn fail_after(n: usize) {
    FAIL_AFTER.with(|fail| fail.set(Some(n)));
}

pub fn reset_failures() {
    FAIL_AFTER.with(|fail| fail.set(None));
}

/// Counts how many drops a value has seen.
#[derive(Clone, Default)]
pub struct DropCounter(std::rc::Rc<Cell<usize>>);

impl DropCounter {
    pub fn track<V>(&self, value: V) -> Tracked<V> {
        Tracked {
            value,
            counter: self.clone(),
        }
    }

    pub fn get(&self) -> usize {
        self.0.get()
    }
}

#[derive(Debug)]
pub struct Tracked<V> {
    pub value: V,
    counter: DropCounter,
}

impl std::fmt::Debug for DropCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DropCounter({})", self.0.get())
    }
}

impl<V> Drop for Tracked<V> {
    fn drop(&mut self) {
        let count = &self.counter.0;
        count.set(count.get() + 1);
    }
}
