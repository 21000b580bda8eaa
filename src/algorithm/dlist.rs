//! The circular doubly-linked intrusive list.
//!
//! Every slot record carries `next` and `prev` links next to its element.
//! Occupied slots form a ring in insertion order, anchored by the pool
//! state; [`NIL`](Link::NIL) takes the place of the sentinel node, so the
//! ring never points back into the pool and survives being moved. Free
//! slots reuse the `next` link for the free chain.

use core::mem::MaybeUninit;
use core::ptr::{addr_of, addr_of_mut};

use super::{construct, dispose, Algorithm, Enumerate, SlotsOf, Traversal};
use crate::storage::{FreeChain, FreeNode, Link, Policy, Slots};

/// The doubly-linked list algorithm.
pub struct Dlist;

/// A slot record with its element at offset zero, followed by the ring
/// links.
#[repr(C)]
pub struct DlistNode<T, L> {
    item: MaybeUninit<T>,
    next: L,
    prev: L,
}

unsafe impl<T, L: Link> FreeNode<L> for DlistNode<T, L> {
    #[inline]
    unsafe fn next_free(node: *const Self) -> L {
        addr_of!((*node).next).read()
    }

    #[inline]
    unsafe fn set_next_free(node: *mut Self, next: L) {
        addr_of_mut!((*node).next).write(next)
    }
}

/// Bookkeeping of a [`Dlist`] pool: the free chain plus both ends of the
/// used ring.
#[derive(Debug)]
pub struct DlistState<L: Link> {
    free: FreeChain<L>,
    head: L,
    tail: L,
}

#[inline]
unsafe fn next_of<T, L: Link, S: Slots<DlistNode<T, L>, Link = L>>(slots: *mut S, link: L) -> L {
    addr_of!((*S::node_ptr(slots, link)).next).read()
}

#[inline]
unsafe fn prev_of<T, L: Link, S: Slots<DlistNode<T, L>, Link = L>>(slots: *mut S, link: L) -> L {
    addr_of!((*S::node_ptr(slots, link)).prev).read()
}

impl<L: Link> DlistState<L> {
    /// Splices `link` onto the tail of the ring.
    unsafe fn push_back<T, S: Slots<DlistNode<T, L>, Link = L>>(&mut self, slots: &mut S, link: L) {
        let node = slots.get_mut_ptr(link);
        addr_of_mut!((*node).prev).write(self.tail);
        addr_of_mut!((*node).next).write(L::NIL);

        if self.tail.is_nil() {
            self.head = link;
        } else {
            addr_of_mut!((*slots.get_mut_ptr(self.tail)).next).write(link);
        }
        self.tail = link;
    }

    /// Takes `link` out of the ring using only its own links.
    unsafe fn unlink<T, S: Slots<DlistNode<T, L>, Link = L>>(&mut self, slots: &mut S, link: L) {
        let next = next_of::<T, L, S>(slots, link);
        let prev = prev_of::<T, L, S>(slots, link);

        if prev.is_nil() {
            self.head = next;
        } else {
            addr_of_mut!((*slots.get_mut_ptr(prev)).next).write(next);
        }

        if next.is_nil() {
            self.tail = prev;
        } else {
            addr_of_mut!((*slots.get_mut_ptr(next)).prev).write(prev);
        }
    }
}

unsafe impl<T, P: Policy> Algorithm<T, P> for Dlist {
    type Node = DlistNode<T, P::Link>;
    type State = DlistState<P::Link>;

    #[inline]
    fn new_state() -> Self::State {
        DlistState {
            free: FreeChain::new(),
            head: P::Link::NIL,
            tail: P::Link::NIL,
        }
    }

    #[inline]
    fn free_chain(state: &mut Self::State) -> &mut FreeChain<P::Link> {
        &mut state.free
    }

    #[inline]
    fn next_free(state: &Self::State) -> Option<P::Link> {
        state.free.peek()
    }

    #[inline]
    unsafe fn create<F: FnOnce() -> T>(
        state: &mut Self::State,
        slots: &mut SlotsOf<T, Self, P>,
        f: F,
    ) -> Option<P::Link> {
        let link = construct::<T, _, Self::Node, _, _>(&mut state.free, slots, f)?;
        state.push_back::<T, _>(slots, link);
        Some(link)
    }

    #[inline]
    unsafe fn remove(state: &mut Self::State, slots: &mut SlotsOf<T, Self, P>, link: P::Link) -> T {
        state.unlink::<T, _>(slots, link);
        let value = slots.get_mut_ptr(link).cast::<T>().read();
        state.free.push(slots, link);
        value
    }

    unsafe fn teardown(state: &mut Self::State, slots: &mut SlotsOf<T, Self, P>, mut len: usize, drop_items: bool) {
        <Self as Enumerate<T, P>>::destroy_all(state, slots, &mut len, drop_items);
    }
}

unsafe impl<T, P: Policy> Traversal<T, P> for Dlist {
    #[inline]
    fn first(state: &Self::State) -> P::Link {
        state.head
    }

    #[inline]
    fn last(state: &Self::State) -> P::Link {
        state.tail
    }

    #[inline]
    unsafe fn next(_: &Self::State, slots: *mut SlotsOf<T, Self, P>, link: P::Link) -> P::Link {
        next_of::<T, P::Link, _>(slots, link)
    }

    #[inline]
    unsafe fn prev(_: &Self::State, slots: *mut SlotsOf<T, Self, P>, link: P::Link) -> P::Link {
        prev_of::<T, P::Link, _>(slots, link)
    }
}

unsafe impl<T, P: Policy> Enumerate<T, P> for Dlist {
    unsafe fn for_each<F: FnMut(*mut T)>(state: &Self::State, slots: &mut SlotsOf<T, Self, P>, _: usize, mut f: F) {
        let mut cur = state.head;
        while !cur.is_nil() {
            let next = next_of::<T, P::Link, _>(slots, cur);
            f(slots.get_mut_ptr(cur).cast());
            cur = next;
        }
    }

    /// Repeatedly takes the head of the ring, so an element is always
    /// unlinked and its slot freed before it is dropped.
    unsafe fn destroy_all(state: &mut Self::State, slots: &mut SlotsOf<T, Self, P>, len: &mut usize, drop_items: bool) {
        while !state.head.is_nil() {
            let link = state.head;
            let value = <Self as Algorithm<T, P>>::remove(state, slots, link);
            *len -= 1;
            dispose(value, drop_items);
        }
    }
}
