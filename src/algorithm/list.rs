//! The singly-linked free list.
//!
//! Free slots form a chain through their own storage; occupied slots are not
//! tracked at all. This makes [`List`] the leanest algorithm, at the cost of
//! iteration: only static pools can enumerate their elements, by checking
//! every slot against the free chain.

use core::mem::ManuallyDrop;
use core::ptr::{addr_of, addr_of_mut};

use super::{construct, dispose, Algorithm, Enumerate, SlotsOf};
use crate::growth::{Blocks, Dynamic, RawMemory};
use crate::storage::{Capacity, FreeChain, FreeNode, Link, RawLink, Slots, Static};

/// The singly-linked free list algorithm.
pub struct List;

/// A slot record holding either an element or the next free link.
#[repr(C)]
pub union ListNode<T, L: Copy> {
    item: ManuallyDrop<T>,
    next: L,
}

unsafe impl<T, L: Link> FreeNode<L> for ListNode<T, L> {
    #[inline]
    unsafe fn next_free(node: *const Self) -> L {
        addr_of!((*node).next).read()
    }

    #[inline]
    unsafe fn set_next_free(node: *mut Self, next: L) {
        addr_of_mut!((*node).next).write(next)
    }
}

/// Bookkeeping of a [`List`] pool: just the free chain.
#[derive(Debug)]
pub struct ListState<L: Link> {
    pub(super) free: FreeChain<L>,
}

unsafe fn remove_item<T, L: Link, S: Slots<ListNode<T, L>, Link = L>>(
    free: &mut FreeChain<L>,
    slots: &mut S,
    link: L,
) -> T {
    let value = slots.get_mut_ptr(link).cast::<T>().read();
    free.push(slots, link);
    value
}

/// A slot of a static list pool is occupied iff it is not on the free chain.
unsafe fn is_occupied<T, I: Capacity + Link, const N: usize>(
    free: &FreeChain<I>,
    slots: &SlotsOf<T, List, Static<I, N>>,
    all_occupied: bool,
    link: I,
) -> bool {
    all_occupied || !free.contains(slots, link)
}

unsafe impl<T, I: Capacity + Link, const N: usize> Algorithm<T, Static<I, N>> for List {
    type Node = ListNode<T, I>;
    type State = ListState<I>;

    #[inline]
    fn new_state() -> Self::State {
        ListState { free: FreeChain::new() }
    }

    #[inline]
    fn free_chain(state: &mut Self::State) -> &mut FreeChain<I> {
        &mut state.free
    }

    #[inline]
    fn next_free(state: &Self::State) -> Option<I> {
        state.free.peek()
    }

    #[inline]
    unsafe fn create<F: FnOnce() -> T>(
        state: &mut Self::State,
        slots: &mut SlotsOf<T, Self, Static<I, N>>,
        f: F,
    ) -> Option<I> {
        construct::<T, _, Self::Node, _, _>(&mut state.free, slots, f)
    }

    #[inline]
    unsafe fn remove(state: &mut Self::State, slots: &mut SlotsOf<T, Self, Static<I, N>>, link: I) -> T {
        remove_item(&mut state.free, slots, link)
    }

    unsafe fn teardown(state: &mut Self::State, slots: &mut SlotsOf<T, Self, Static<I, N>>, mut len: usize, drop_items: bool) {
        if drop_items {
            <Self as Enumerate<T, Static<I, N>>>::destroy_all(state, slots, &mut len, true);
        }
    }
}

unsafe impl<T, I: Capacity + Link, const N: usize> Enumerate<T, Static<I, N>> for List {
    /// Visits the live elements in slot order. O(N) if the pool is full,
    /// O(N²) otherwise.
    unsafe fn for_each<F: FnMut(*mut T)>(
        state: &Self::State,
        slots: &mut SlotsOf<T, Self, Static<I, N>>,
        len: usize,
        mut f: F,
    ) {
        let all_occupied = state.free.is_empty();
        let mut remaining = len;
        for i in 0..N {
            if remaining == 0 {
                break;
            }

            let link = I::from_usize(i);
            if is_occupied(&state.free, slots, all_occupied, link) {
                remaining -= 1;
                f(slots.get_mut_ptr(link).cast());
            }
        }
    }

    unsafe fn destroy_all(
        state: &mut Self::State,
        slots: &mut SlotsOf<T, Self, Static<I, N>>,
        len: &mut usize,
        drop_items: bool,
    ) {
        let all_occupied = state.free.is_empty();
        for i in 0..N {
            if *len == 0 {
                break;
            }

            let link = I::from_usize(i);
            if is_occupied(&state.free, slots, all_occupied, link) {
                let value = remove_item::<T, _, _>(&mut state.free, slots, link);
                *len -= 1;
                dispose(value, drop_items);
            }
        }
    }
}

unsafe impl<T, M: RawMemory> Algorithm<T, Dynamic<M>> for List {
    type Node = ListNode<T, RawLink>;
    type State = ListState<RawLink>;

    #[inline]
    fn new_state() -> Self::State {
        ListState { free: FreeChain::new() }
    }

    #[inline]
    fn free_chain(state: &mut Self::State) -> &mut FreeChain<RawLink> {
        &mut state.free
    }

    #[inline]
    fn next_free(state: &Self::State) -> Option<RawLink> {
        state.free.peek()
    }

    #[inline]
    unsafe fn create<F: FnOnce() -> T>(
        state: &mut Self::State,
        slots: &mut SlotsOf<T, Self, Dynamic<M>>,
        f: F,
    ) -> Option<RawLink> {
        construct::<T, _, Self::Node, _, _>(&mut state.free, slots, f)
    }

    #[inline]
    unsafe fn remove(
        state: &mut Self::State,
        slots: &mut SlotsOf<T, Self, Dynamic<M>>,
        link: RawLink,
    ) -> T {
        remove_item(&mut state.free, slots, link)
    }

    unsafe fn teardown(_: &mut Self::State, _: &mut SlotsOf<T, Self, Dynamic<M>>, len: usize, _: bool) {
        if len > 0 {
            log::warn!("dropping a single-slot list pool leaks {} live elements and their slots", len);
        }
    }
}

unsafe impl<T, M: RawMemory, const B: usize> Algorithm<T, Blocks<M, B>> for List {
    type Node = ListNode<T, RawLink>;
    type State = ListState<RawLink>;

    #[inline]
    fn new_state() -> Self::State {
        ListState { free: FreeChain::new() }
    }

    #[inline]
    fn free_chain(state: &mut Self::State) -> &mut FreeChain<RawLink> {
        &mut state.free
    }

    #[inline]
    fn next_free(state: &Self::State) -> Option<RawLink> {
        state.free.peek()
    }

    #[inline]
    unsafe fn create<F: FnOnce() -> T>(
        state: &mut Self::State,
        slots: &mut SlotsOf<T, Self, Blocks<M, B>>,
        f: F,
    ) -> Option<RawLink> {
        construct::<T, _, Self::Node, _, _>(&mut state.free, slots, f)
    }

    #[inline]
    unsafe fn remove(
        state: &mut Self::State,
        slots: &mut SlotsOf<T, Self, Blocks<M, B>>,
        link: RawLink,
    ) -> T {
        remove_item(&mut state.free, slots, link)
    }

    unsafe fn teardown(_: &mut Self::State, _: &mut SlotsOf<T, Self, Blocks<M, B>>, len: usize, drop_items: bool) {
        if len > 0 && drop_items {
            log::warn!("dropping a block list pool releases {} live elements without dropping them", len);
        }
    }
}
