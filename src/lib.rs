#![no_std]
#![cfg_attr(docs_rs, feature(doc_cfg))]
#![warn(missing_docs)]

//! Fixed-element-size object pools with constant-time allocation.
//!
//! A pool hands out and reclaims storage for values of a single type
//! without touching a general-purpose allocator on the hot path. Pools are
//! assembled at compile time from three parts:
//!
//! * a capacity **policy** deciding where slots live: [`Static`] (inline
//!   array, fixed size), [`Dynamic`] (one heap allocation per slot) or
//!   [`Blocks`] (one heap allocation per `B` slots);
//! * a node-management **algorithm** tracking free and used slots:
//!   [`List`], [`Bitset`] or [`Dlist`], see the [`algorithm`] module for
//!   how they compare;
//! * a set of behavior [`flags`].
//!
//! The type aliases in this module cover the common combinations.
//!
//! # Examples
//! ```
//! use slotpool::PoolDlist;
//!
//! #[derive(Debug, PartialEq)]
//! struct Particle {
//!     pos: (f32, f32),
//!     ttl: u32,
//! }
//!
//! let mut particles = PoolDlist::<Particle>::new();
//! let p = particles.create(Particle { pos: (0.0, 0.0), ttl: 3 }).unwrap();
//! particles.create(Particle { pos: (1.0, 2.0), ttl: 1 });
//!
//! for particle in particles.iter_mut() {
//!     particle.ttl -= 1;
//! }
//!
//! let mut cursor = particles.cursor_front_mut();
//! while let Some(particle) = cursor.current() {
//!     if particle.ttl == 0 {
//!         cursor.destroy_current();
//!     } else {
//!         cursor.move_next();
//!     }
//! }
//!
//! assert_eq!(particles.len(), 1);
//! assert_eq!(unsafe { p.as_ref() }.ttl, 2);
//! ```
//!
//! # Crate Features
//!
//! * `alloc`: Enables the [`Global`](growth::Global) raw-memory provider and
//!   the heap-backed pool aliases. Enabled by default; without it, only
//!   static pools and pools over a custom [`RawMemory`] are available.
//!
//! Diagnostics are emitted through the [`log`](https://docs.rs/log) facade.

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod algorithm;
pub mod growth;
pub mod iter;
pub mod pool;
pub mod storage;

#[cfg(test)]
mod test_utils;

pub use crate::algorithm::{bitset_words, Bitset, Dlist, List};
pub use crate::growth::{Blocks, Dynamic, RawMemory};
pub use crate::pool::{flags, Pool, PoolPtr};
pub use crate::storage::Static;

/// The error type for fallible pool operations.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PoolError {
    /// No free slot was available, and none could be added.
    Exhausted,
    /// Growing the pool failed before the requested capacity was reached.
    AllocFailed {
        /// The capacity that was asked for.
        requested: usize,
        /// The capacity the pool ended up with.
        capacity: usize,
    },
}

impl core::fmt::Display for PoolError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PoolError::Exhausted => f.write_str("no free slot available"),
            PoolError::AllocFailed { requested, capacity } => write!(
                f,
                "failed to allocate pool storage: requested capacity {}, reached {}",
                requested, capacity
            ),
        }
    }
}

/// A specialized Result type for pool operations.
pub type Result<T> = core::result::Result<T, PoolError>;

/// A static pool of `N` elements using the singly-linked free list.
///
/// # Examples
/// ```
/// let mut pool = slotpool::SPoolList::<i32, 2>::new();
/// assert!(pool.create(1).is_some());
/// assert!(pool.create(2).is_some());
/// assert!(pool.create(3).is_none());
/// pool.destroy_all();
/// assert_eq!((pool.len(), pool.capacity()), (0, 2));
/// ```
pub type SPoolList<T, const N: usize, const F: u32 = 0> = Pool<T, List, Static<u32, N>, F>;

/// A static pool of `N` elements using the bitset-augmented free list with
/// `W` words of occupancy bits; pass [`bitset_words(N)`](bitset_words).
pub type SPoolBitset<T, const N: usize, const W: usize, const F: u32 = 0> = Pool<T, Bitset<W>, Static<u32, N>, F>;

/// A static pool of `N` elements using the doubly-linked list.
pub type SPoolDlist<T, const N: usize, const F: u32 = 0> = Pool<T, Dlist, Static<u32, N>, F>;

/// A static doubly-linked pool of `N` elements, indexed by the specified
/// [`Capacity`](storage::Capacity) type.
pub type TiSPoolDlist<T, I, const N: usize, const F: u32 = 0> = Pool<T, Dlist, Static<I, N>, F>;

/// A growable pool using the singly-linked free list, allocating one slot
/// at a time.
///
/// Dropping such a pool while it holds live elements leaks them, since it
/// has no way to find them.
#[cfg(feature = "alloc")]
#[cfg_attr(docs_rs, doc(cfg(feature = "alloc")))]
pub type PoolList<T, const F: u32 = 0> = Pool<T, List, Dynamic<growth::Global>, F>;

/// A growable pool using the singly-linked free list, allocating `B` slots
/// at a time.
#[cfg(feature = "alloc")]
#[cfg_attr(docs_rs, doc(cfg(feature = "alloc")))]
pub type PoolListBlock<T, const B: usize, const F: u32 = 0> = Pool<T, List, Blocks<growth::Global, B>, F>;

/// A growable pool using the doubly-linked list, allocating one slot at a
/// time.
#[cfg(feature = "alloc")]
#[cfg_attr(docs_rs, doc(cfg(feature = "alloc")))]
pub type PoolDlist<T, const F: u32 = 0> = Pool<T, Dlist, Dynamic<growth::Global>, F>;

/// A growable pool using the doubly-linked list, allocating `B` slots at a
/// time.
///
/// # Examples
/// ```
/// let mut pool = slotpool::PoolDlistBlock::<u8, 2>::new();
/// pool.shrink_to_fit(0);
/// assert_eq!(pool.capacity(), 0);
/// pool.create(1);
/// assert_eq!(pool.capacity(), 2);
/// ```
#[cfg(feature = "alloc")]
#[cfg_attr(docs_rs, doc(cfg(feature = "alloc")))]
pub type PoolDlistBlock<T, const B: usize, const F: u32 = 0> = Pool<T, Dlist, Blocks<growth::Global, B>, F>;
