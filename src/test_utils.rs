use core::alloc::Layout;
use core::cell::Cell;
use core::ptr::NonNull;

use crate::growth::RawMemory;
use crate::storage::{FreeNode, Link};

pub(crate) const RNG_SEED: [u8; 32] = [
    0x3E, 0x6A, 0x91, 0x0C, 0xD4, 0x27, 0xB8, 0x55, 0x1F, 0xA0, 0x63, 0xE9, 0x72, 0x08, 0xCB, 0x4D,
    0x85, 0x5B, 0xF2, 0x19, 0x6C, 0xAE, 0x30, 0xD7, 0x4A, 0x91, 0x0E, 0x7F, 0xC3, 0x28, 0xB6, 0x64,
];

#[derive(Debug, Default)]
pub(crate) struct DropCounter {
    count: Cell<usize>,
}

impl DropCounter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn new_droppable<T>(&self, value: T) -> Droppable<'_, T> {
        Droppable { value, counter: self }
    }

    pub(crate) fn dropped(&self) -> usize {
        self.count.get()
    }
}

#[derive(Debug)]
pub(crate) struct Droppable<'a, T = ()> {
    pub value: T,
    counter: &'a DropCounter,
}

impl<T> Drop for Droppable<'_, T> {
    fn drop(&mut self) {
        let new_count = self.counter.count.get() + 1;
        self.counter.count.set(new_count);
    }
}

/// Stands in for a constructor that fails halfway through.
pub(crate) struct PanicOnCreate;

impl PanicOnCreate {
    pub(crate) fn value<T>() -> T {
        panic!("constructor failed")
    }
}

/// An element whose destructor panics if it is armed.
#[derive(Debug)]
pub(crate) struct PanicOnDrop {
    pub armed: bool,
}

impl Drop for PanicOnDrop {
    fn drop(&mut self) {
        if self.armed {
            panic!("destructor failed");
        }
    }
}

/// A slot record that is large enough to hold any link or a `u64`.
#[repr(C, align(8))]
pub(crate) struct TestNode([u64; 2]);

unsafe impl<L: Link> FreeNode<L> for TestNode {
    unsafe fn next_free(node: *const Self) -> L {
        node.cast::<L>().read()
    }

    unsafe fn set_next_free(node: *mut Self, next: L) {
        node.cast::<L>().write(next)
    }
}

std::thread_local! {
    static BUDGET: Cell<Option<usize>> = const { Cell::new(None) };
    static OUTSTANDING: Cell<usize> = const { Cell::new(0) };
}

/// A raw-memory provider backed by the global allocator that starts failing
/// once the budget set with [`FlakyMemory::budget`] is used up.
pub(crate) struct FlakyMemory;

pub(crate) struct BudgetGuard;

impl Drop for BudgetGuard {
    fn drop(&mut self) {
        BUDGET.with(|b| b.set(None));
    }
}

impl FlakyMemory {
    /// Allows `allocations` more successful allocations on this thread.
    pub(crate) fn budget(allocations: usize) -> BudgetGuard {
        BUDGET.with(|b| b.set(Some(allocations)));
        BudgetGuard
    }

    /// Number of blocks allocated on this thread and not yet released.
    pub(crate) fn outstanding() -> usize {
        OUTSTANDING.with(Cell::get)
    }
}

unsafe impl RawMemory for FlakyMemory {
    fn allocate(layout: Layout) -> Option<NonNull<u8>> {
        let allowed = BUDGET.with(|b| match b.get() {
            Some(0) => false,
            Some(n) => {
                b.set(Some(n - 1));
                true
            }
            None => true,
        });
        if !allowed {
            return None;
        }

        let ptr = NonNull::new(unsafe { std::alloc::alloc(layout) })?;
        OUTSTANDING.with(|o| o.set(o.get() + 1));
        Some(ptr)
    }

    unsafe fn deallocate(ptr: NonNull<u8>, layout: Layout) {
        OUTSTANDING.with(|o| o.set(o.get() - 1));
        std::alloc::dealloc(ptr.as_ptr(), layout);
    }
}
