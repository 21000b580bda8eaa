//! The bitset-augmented free list.
//!
//! Allocation works exactly like [`List`](super::List), but every slot also
//! has an occupancy bit, which makes enumeration O(N) and enables
//! bidirectional iteration in slot order. The bit vector has a fixed size,
//! so this algorithm is only available for static pools.

use super::list::{ListNode, ListState};
use super::{construct, dispose, Algorithm, Enumerate, SlotsOf, Traversal};
use crate::storage::{Capacity, FreeChain, Link, Slots, Static};

const WORD_BITS: usize = usize::BITS as usize;

/// Returns the number of `usize` words a [`Bitset`] needs to track `n`
/// slots.
///
/// # Examples
/// ```
/// use slotpool::{bitset_words, SPoolBitset};
///
/// const N: usize = 100;
/// let pool = SPoolBitset::<u8, N, { bitset_words(N) }>::new();
/// assert_eq!(pool.capacity(), N);
/// ```
pub const fn bitset_words(n: usize) -> usize {
    (n + WORD_BITS - 1) / WORD_BITS
}

/// The bitset-augmented free list algorithm, with `W` words of occupancy
/// bits.
///
/// `W` must be at least [`bitset_words`] of the pool's capacity; this is
/// checked at compile time.
pub struct Bitset<const W: usize>;

/// Bookkeeping of a [`Bitset`] pool.
pub struct BitsetState<I: Link, const W: usize> {
    list: ListState<I>,
    used: [usize; W],
}

impl<I: Link, const W: usize> core::fmt::Debug for BitsetState<I, W> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BitsetState")
            .field("free", &self.list)
            .field("occupied", &self.count())
            .finish()
    }
}

impl<I: Link, const W: usize> BitsetState<I, W> {
    #[inline]
    fn set(&mut self, index: usize) {
        self.used[index / WORD_BITS] |= 1 << (index % WORD_BITS);
    }

    #[inline]
    fn clear(&mut self, index: usize) {
        self.used[index / WORD_BITS] &= !(1 << (index % WORD_BITS));
    }

    #[inline]
    fn test(&self, index: usize) -> bool {
        self.used[index / WORD_BITS] & (1 << (index % WORD_BITS)) != 0
    }

    fn count(&self) -> usize {
        self.used.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns the lowest set index `>= from`.
    fn next_set(&self, from: usize) -> Option<usize> {
        let mut word = from / WORD_BITS;
        if word >= W {
            return None;
        }

        let mut bits = self.used[word] & (!0 << (from % WORD_BITS));
        loop {
            if bits != 0 {
                return Some(word * WORD_BITS + bits.trailing_zeros() as usize);
            }

            word += 1;
            if word == W {
                return None;
            }
            bits = self.used[word];
        }
    }

    /// Returns the highest set index `< before`.
    fn prev_set(&self, before: usize) -> Option<usize> {
        if before == 0 || W == 0 {
            return None;
        }

        let last = (before - 1).min(W * WORD_BITS - 1);
        let mut word = last / WORD_BITS;
        let shift = WORD_BITS - 1 - last % WORD_BITS;
        let mut bits = (self.used[word] << shift) >> shift;
        loop {
            if bits != 0 {
                return Some(word * WORD_BITS + (WORD_BITS - 1 - bits.leading_zeros() as usize));
            }

            if word == 0 {
                return None;
            }
            word -= 1;
            bits = self.used[word];
        }
    }
}

struct Covers<const W: usize, const N: usize>;

impl<const W: usize, const N: usize> Covers<W, N> {
    const CHECK: () = assert!(W * WORD_BITS >= N, "bitset word count too small for pool capacity");
}

#[inline]
fn link_or_nil<I: Capacity + Link>(index: Option<usize>) -> I {
    index.map_or(I::NIL, I::from_usize)
}

unsafe impl<T, I: Capacity + Link, const N: usize, const W: usize> Algorithm<T, Static<I, N>> for Bitset<W> {
    type Node = ListNode<T, I>;
    type State = BitsetState<I, W>;

    #[inline]
    fn new_state() -> Self::State {
        #[allow(clippy::let_unit_value)]
        let () = Covers::<W, N>::CHECK;
        BitsetState {
            list: <super::List as Algorithm<T, Static<I, N>>>::new_state(),
            used: [0; W],
        }
    }

    #[inline]
    fn free_chain(state: &mut Self::State) -> &mut FreeChain<I> {
        <super::List as Algorithm<T, Static<I, N>>>::free_chain(&mut state.list)
    }

    #[inline]
    fn next_free(state: &Self::State) -> Option<I> {
        <super::List as Algorithm<T, Static<I, N>>>::next_free(&state.list)
    }

    #[inline]
    unsafe fn create<F: FnOnce() -> T>(
        state: &mut Self::State,
        slots: &mut SlotsOf<T, Self, Static<I, N>>,
        f: F,
    ) -> Option<I> {
        let free = <super::List as Algorithm<T, Static<I, N>>>::free_chain(&mut state.list);
        let link = construct::<T, _, Self::Node, _, _>(free, slots, f)?;
        state.set(link.as_usize());
        Some(link)
    }

    #[inline]
    unsafe fn remove(state: &mut Self::State, slots: &mut SlotsOf<T, Self, Static<I, N>>, link: I) -> T {
        let index = link.as_usize();
        debug_assert!(state.test(index), "slot {} is not occupied", index);
        state.clear(index);
        <super::List as Algorithm<T, Static<I, N>>>::remove(&mut state.list, slots, link)
    }

    unsafe fn teardown(state: &mut Self::State, slots: &mut SlotsOf<T, Self, Static<I, N>>, mut len: usize, drop_items: bool) {
        if drop_items {
            <Self as Enumerate<T, Static<I, N>>>::destroy_all(state, slots, &mut len, true);
        }
    }
}

unsafe impl<T, I: Capacity + Link, const N: usize, const W: usize> Traversal<T, Static<I, N>> for Bitset<W> {
    #[inline]
    fn first(state: &Self::State) -> I {
        link_or_nil(state.next_set(0))
    }

    #[inline]
    fn last(state: &Self::State) -> I {
        link_or_nil(state.prev_set(N))
    }

    #[inline]
    unsafe fn next(state: &Self::State, _: *mut SlotsOf<T, Self, Static<I, N>>, link: I) -> I {
        link_or_nil(state.next_set(link.as_usize() + 1))
    }

    #[inline]
    unsafe fn prev(state: &Self::State, _: *mut SlotsOf<T, Self, Static<I, N>>, link: I) -> I {
        link_or_nil(state.prev_set(link.as_usize()))
    }
}

unsafe impl<T, I: Capacity + Link, const N: usize, const W: usize> Enumerate<T, Static<I, N>> for Bitset<W> {
    unsafe fn for_each<F: FnMut(*mut T)>(
        state: &Self::State,
        slots: &mut SlotsOf<T, Self, Static<I, N>>,
        _: usize,
        mut f: F,
    ) {
        let mut cursor = state.next_set(0);
        while let Some(index) = cursor {
            f(slots.get_mut_ptr(I::from_usize(index)).cast());
            cursor = state.next_set(index + 1);
        }
    }

    unsafe fn destroy_all(
        state: &mut Self::State,
        slots: &mut SlotsOf<T, Self, Static<I, N>>,
        len: &mut usize,
        drop_items: bool,
    ) {
        let mut cursor = state.next_set(0);
        while let Some(index) = cursor {
            let value = <Self as Algorithm<T, Static<I, N>>>::remove(state, slots, I::from_usize(index));
            *len -= 1;
            dispose(value, drop_items);
            cursor = state.next_set(index + 1);
        }
    }
}
