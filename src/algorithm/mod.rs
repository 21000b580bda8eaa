//! Node-management algorithms: the bookkeeping that tracks which slots are
//! free and which hold live elements.
//!
//! Every algorithm pops slots from a [`FreeChain`] and constructs elements in
//! place. They differ in how they track the used set:
//!
//! | Algorithm | used-set tracking | iteration | `for_each` / `destroy_all` |
//! |-----------|-------------------|-----------|----------------------------|
//! | [`List`] | none | no | static pools only; O(N) if full, O(N²) otherwise |
//! | [`Bitset`] | one bit per slot | bidirectional | O(N) |
//! | [`Dlist`] | intrusive doubly-linked ring | bidirectional | O(N) |
//!
//! Algorithms are selected at compile time through the `A` parameter of
//! [`Pool`](crate::pool::Pool); each one implements [`Algorithm`] for
//! every capacity policy it supports.

use core::mem;

use crate::storage::{FreeChain, FreeNode, Link, Policy, Slots};

pub mod bitset;
pub mod dlist;
pub mod list;

pub use bitset::{bitset_words, Bitset};
pub use dlist::Dlist;
pub use list::List;

/// Shorthand for the slot container an algorithm uses under policy `P`.
pub type SlotsOf<T, A, P> = <P as Policy>::Slots<<A as Algorithm<T, P>>::Node>;

/// A node-management algorithm for elements of type `T` under policy `P`.
///
/// # Safety
/// Implementors must store the element at offset zero of
/// [`Node`](Algorithm::Node), so that [`value_ptr`](Algorithm::value_ptr)
/// is valid, and must keep the free chain returned by
/// [`free_chain`](Algorithm::free_chain) consistent with the slots that
/// hold no live element.
pub unsafe trait Algorithm<T, P: Policy>: Sized {
    /// The slot record type.
    type Node: FreeNode<P::Link>;
    /// Pool-level bookkeeping (free chain head, bit vector, ring anchors).
    type State;

    /// Creates the bookkeeping of an empty pool with an empty free chain.
    fn new_state() -> Self::State;

    /// Returns the free chain inside `state`.
    fn free_chain(state: &mut Self::State) -> &mut FreeChain<P::Link>;

    /// Returns the slot the next creation would use.
    fn next_free(state: &Self::State) -> Option<P::Link>;

    /// Pops a free slot and moves the result of `f` into it.
    ///
    /// Returns [`None`] without calling `f` if no slot is free. If `f`
    /// panics, the popped slot is put back and the pool stays consistent.
    ///
    /// # Safety
    /// `slots` must be the container the state's free chain refers to.
    unsafe fn create<F: FnOnce() -> T>(
        state: &mut Self::State,
        slots: &mut SlotsOf<T, Self, P>,
        f: F,
    ) -> Option<P::Link>;

    /// Moves the element out of the occupied slot `link` and returns the slot
    /// to the free chain.
    ///
    /// # Safety
    /// `link` must refer to an occupied slot of `slots`.
    unsafe fn remove(state: &mut Self::State, slots: &mut SlotsOf<T, Self, P>, link: P::Link) -> T;

    /// Prepares the pool for releasing its storage: drops the `len` live
    /// elements if `drop_items` is set and returns every reachable slot to
    /// the free chain.
    ///
    /// # Safety
    /// Must be called at most once, right before the policy releases `slots`.
    unsafe fn teardown(state: &mut Self::State, slots: &mut SlotsOf<T, Self, P>, len: usize, drop_items: bool);

    /// Returns a pointer to the element stored in slot `link`.
    ///
    /// # Safety
    /// `slots` must point to a live container and `link` must not be
    /// [`NIL`](Link::NIL).
    #[inline]
    unsafe fn value_ptr(slots: *mut SlotsOf<T, Self, P>, link: P::Link) -> *mut T {
        <SlotsOf<T, Self, P> as Slots<Self::Node>>::node_ptr(slots, link).cast()
    }
}

/// Algorithms that can visit the live elements of a pool in order.
///
/// Traversals take the slot container by raw pointer so that mutable
/// iterators can hand out element references while still reading links.
///
/// # Safety
/// `first`, `last`, `next` and `prev` must only ever yield occupied slots
/// or [`NIL`](Link::NIL), and `next`/`prev` must be each other's inverse.
pub unsafe trait Traversal<T, P: Policy>: Algorithm<T, P> {
    /// Returns the first live slot, or `NIL` if the pool is empty.
    fn first(state: &Self::State) -> P::Link;

    /// Returns the last live slot, or `NIL` if the pool is empty.
    fn last(state: &Self::State) -> P::Link;

    /// Returns the live slot after `link`, or `NIL` past the end.
    ///
    /// # Safety
    /// `link` must be an occupied slot of the container behind `slots`.
    unsafe fn next(state: &Self::State, slots: *mut SlotsOf<T, Self, P>, link: P::Link) -> P::Link;

    /// Returns the live slot before `link`, or `NIL` before the start.
    ///
    /// # Safety
    /// `link` must be an occupied slot of the container behind `slots`.
    unsafe fn prev(state: &Self::State, slots: *mut SlotsOf<T, Self, P>, link: P::Link) -> P::Link;
}

/// Algorithms that can enumerate every live element of a pool.
///
/// # Safety
/// `for_each` must visit each of the `len` live elements exactly once, and
/// `destroy_all` must leave every slot on the free chain. An element's slot
/// must be freed and `len` decremented before the element is dropped, so
/// that a panicking destructor leaves the pool consistent.
pub unsafe trait Enumerate<T, P: Policy>: Algorithm<T, P> {
    /// Calls `f` with a pointer to each of the `len` live elements.
    ///
    /// # Safety
    /// `len` must be the number of occupied slots.
    unsafe fn for_each<F: FnMut(*mut T)>(
        state: &Self::State,
        slots: &mut SlotsOf<T, Self, P>,
        len: usize,
        f: F,
    );

    /// Ends the lifetime of all `*len` live elements, dropping them only if
    /// `drop_items` is set, and frees their slots. `*len` counts down as
    /// elements are removed.
    ///
    /// # Safety
    /// `*len` must be the number of occupied slots.
    unsafe fn destroy_all(state: &mut Self::State, slots: &mut SlotsOf<T, Self, P>, len: &mut usize, drop_items: bool);
}

/// Drops or forgets a value that has already been moved out of its slot.
#[inline]
pub(crate) fn dispose<T>(value: T, drop_items: bool) {
    if drop_items {
        drop(value);
    } else {
        mem::forget(value);
    }
}

/// Puts a popped slot back on top of the free chain unless disarmed.
struct RestoreFree<'a, L: Link> {
    free: &'a mut FreeChain<L>,
    head: L,
}

impl<L: Link> Drop for RestoreFree<'_, L> {
    fn drop(&mut self) {
        self.free.set_head(self.head);
    }
}

/// Pops a free slot and writes the result of `f` into it.
///
/// The popped slot's next-free link is left untouched until `f` has
/// returned, so restoring the old head is all it takes to undo the pop.
///
/// # Safety
/// Every link on `free` must belong to `slots`, and `N` must store its
/// element at offset zero.
pub(crate) unsafe fn construct<T, L, N, S, F>(free: &mut FreeChain<L>, slots: &mut S, f: F) -> Option<L>
where
    L: Link,
    N: FreeNode<L>,
    S: Slots<N, Link = L>,
    F: FnOnce() -> T,
{
    let link = free.pop(slots)?;
    let guard = RestoreFree { free, head: link };
    let value = f();
    mem::forget(guard);

    slots.get_mut_ptr(link).cast::<T>().write(value);
    Some(link)
}
