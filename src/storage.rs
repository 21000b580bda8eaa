//! Traits providing genericity over slot storage, index types and links.
//!
//! A pool never stores references to itself: slot records refer to each
//! other through [`Link`]s, which are either indices into an inline array
//! ([`Static`] pools) or raw node addresses ([`Dynamic`](crate::growth::Dynamic)
//! and [`Blocks`](crate::growth::Blocks) pools). The distinguished
//! [`Link::NIL`] value stands in for the sentinel that closes every list, so
//! moving a pool by value never invalidates its bookkeeping.

use core::fmt::Debug;
use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::ptr::addr_of_mut;

/// Two-way conversion between `Self` and `usize`.
///
/// # Safety
/// Implementors must ensure the conversion functions are each other's inverse,
/// i.e. `Capacity::from_usize(i).as_usize()` must either evaluate to `i`, or
/// panic for all `usize` values.
///
/// Using [`index_type!`] should be preferred over implementing this manually.
pub unsafe trait Capacity: Copy + Eq + Debug {
    /// The largest `usize` value that can be represented by `Self`.
    const MAX_REPRESENTABLE: usize;
    /// Convert a `usize` into `Self`.
    fn from_usize(i: usize) -> Self;
    /// Convert `self` into `usize`.
    fn as_usize(&self) -> usize;
}

#[inline(never)]
#[cold]
#[track_caller]
fn from_value_out_of_range(i: usize) -> ! {
    panic!("called `from_usize` with value out of range (is {})", i)
}

#[inline(never)]
#[cold]
#[track_caller]
fn into_value_out_of_range() -> ! {
    panic!("called `as_usize` with value out of range")
}

#[inline(never)]
#[cold]
#[track_caller]
pub(crate) fn buffer_too_large_for_index_type<I: Capacity>() -> ! {
    panic!(
        "pool capacity must be less than {} for index type {}",
        I::MAX_REPRESENTABLE,
        core::any::type_name::<I>()
    )
}

macro_rules! impl_capacity {
    ($($t:ty),*) => {$(
        unsafe impl Capacity for $t {
            const MAX_REPRESENTABLE: usize = if (<$t>::MAX as u128) < (usize::MAX as u128) {
                <$t>::MAX as usize
            } else {
                usize::MAX
            };

            #[inline]
            #[track_caller]
            fn from_usize(i: usize) -> Self {
                if let Ok(t) = i.try_into() {
                    t
                } else {
                    from_value_out_of_range(i);
                }
            }

            #[inline]
            #[track_caller]
            fn as_usize(&self) -> usize {
                if let Ok(t) = (*self).try_into() {
                    t
                } else {
                    into_value_out_of_range();
                }
            }
        }

        impl Link for $t {
            const NIL: Self = <$t>::MAX;
        }
    )*}
}

impl_capacity!(u8, u16, u32, u64);

unsafe impl Capacity for usize {
    const MAX_REPRESENTABLE: usize = usize::MAX;

    #[inline]
    fn from_usize(i: usize) -> Self {
        i
    }

    #[inline]
    fn as_usize(&self) -> usize {
        *self
    }
}

impl Link for usize {
    const NIL: Self = usize::MAX;
}

/// Generates a newtype wrapping an implementor of [`Capacity`], usable as the
/// index type of a static pool.
///
/// # Examples
/// ```
/// use slotpool::{index_type, TiSPoolDlist};
///
/// index_type! { pub Particle: u8 };
///
/// let mut pool = TiSPoolDlist::<f32, Particle, 16>::new();
/// assert!(pool.create(1.5).is_some());
/// assert_eq!(pool.capacity(), 16);
/// ```
#[macro_export]
macro_rules! index_type {
    ($v:vis $name:ident: $repr:ty) => {
        #[derive(
            core::marker::Copy,
            core::clone::Clone,
            core::default::Default,
            core::fmt::Debug,
            core::hash::Hash,
            core::cmp::PartialEq,
            core::cmp::Eq,
            core::cmp::PartialOrd,
            core::cmp::Ord)]
        $v struct $name($repr);

        unsafe impl $crate::storage::Capacity for $name {
            const MAX_REPRESENTABLE: usize = <$repr as $crate::storage::Capacity>::MAX_REPRESENTABLE;

            #[inline]
            #[track_caller]
            fn from_usize(i: usize) -> Self {
                Self(<$repr as $crate::storage::Capacity>::from_usize(i))
            }

            #[inline]
            #[track_caller]
            fn as_usize(&self) -> usize {
                <$repr as $crate::storage::Capacity>::as_usize(&self.0)
            }
        }

        impl $crate::storage::Link for $name {
            const NIL: Self = Self(<$repr as $crate::storage::Link>::NIL);
        }
    }
}

/// A reference from one slot record to another.
///
/// [`NIL`](Link::NIL) marks the end of the free chain and plays the role of
/// the sentinel in the used ring of [`Dlist`](crate::algorithm::Dlist) pools.
pub trait Link: Copy + Eq + Debug {
    /// The link that refers to no slot.
    const NIL: Self;

    /// Returns `true` if `self` is [`NIL`](Link::NIL).
    #[inline]
    fn is_nil(&self) -> bool {
        *self == Self::NIL
    }
}

/// A link holding the address of a heap-allocated slot record.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RawLink(pub(crate) *mut u8);

impl Link for RawLink {
    const NIL: Self = RawLink(core::ptr::null_mut());
}

impl RawLink {
    #[inline]
    pub(crate) fn from_node<N>(node: *mut N) -> Self {
        RawLink(node.cast())
    }

    #[inline]
    pub(crate) fn node<N>(self) -> *mut N {
        self.0.cast()
    }
}

/// A collection of slot records of type `N`, addressed through links.
///
/// # Safety
/// Implementors must ensure that every link handed out by the owning
/// [`Policy`] resolves to the same, correctly aligned node for as long as
/// the slot exists, and that [`link_of`](Slots::link_of) is the inverse of
/// [`node_ptr`](Slots::node_ptr).
pub unsafe trait Slots<N>: Sized {
    /// The link type used to address slots.
    type Link: Link;

    /// Returns the total number of slot records currently owned.
    fn capacity(&self) -> usize;

    /// Resolves `link` into a node pointer without creating a reference to
    /// the container.
    ///
    /// # Safety
    /// `this` must point to a live container and `link` must not be
    /// [`NIL`](Link::NIL).
    unsafe fn node_ptr(this: *mut Self, link: Self::Link) -> *mut N;

    /// Maps a node pointer back to its link.
    ///
    /// # Panics
    /// Implementations that can cheaply verify ownership panic if `node`
    /// does not belong to this container.
    fn link_of(&self, node: *const N) -> Self::Link;

    /// Returns a pointer to the node referred to by `link`.
    #[inline]
    fn get_ptr(&self, link: Self::Link) -> *const N {
        unsafe { Self::node_ptr(self as *const Self as *mut Self, link) }
    }

    /// Returns a mutable pointer to the node referred to by `link`.
    #[inline]
    fn get_mut_ptr(&mut self, link: Self::Link) -> *mut N {
        unsafe { Self::node_ptr(self, link) }
    }
}

/// Slot records that carry a "next free" link while unoccupied.
///
/// # Safety
/// The link must be stored inside the node itself, and writing it must not
/// touch anything outside the node.
pub unsafe trait FreeNode<L: Link> {
    /// Reads the next-free link of `node`.
    ///
    /// # Safety
    /// `node` must point to a slot record that is currently on a free chain.
    unsafe fn next_free(node: *const Self) -> L;

    /// Overwrites the next-free link of `node`.
    ///
    /// # Safety
    /// `node` must point to a slot record that holds no live element.
    unsafe fn set_next_free(node: *mut Self, next: L);
}

/// The singly-linked chain of free slot records.
///
/// Every node-management algorithm keeps one of these; it is the only part
/// of a pool's bookkeeping that a [`Policy`] touches when it grows or
/// shrinks.
#[derive(Debug)]
pub struct FreeChain<L: Link> {
    head: L,
}

impl<L: Link> Default for FreeChain<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Link> FreeChain<L> {
    /// Constructs an empty chain.
    #[inline]
    pub const fn new() -> Self {
        FreeChain { head: L::NIL }
    }

    /// Returns `true` if there are no free slots.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_nil()
    }

    /// Returns the slot that the next [`pop`](FreeChain::pop) would yield.
    #[inline]
    pub fn peek(&self) -> Option<L> {
        if self.head.is_nil() {
            None
        } else {
            Some(self.head)
        }
    }

    #[inline]
    pub(crate) fn set_head(&mut self, head: L) {
        self.head = head;
    }

    /// Forgets all free slots without touching them.
    #[inline]
    pub fn reset(&mut self) {
        self.head = L::NIL;
    }

    /// Pushes `link` onto the chain.
    ///
    /// # Safety
    /// `link` must belong to `slots`, must not be on the chain already and
    /// must not hold a live element.
    #[inline]
    pub unsafe fn push<N: FreeNode<L>, S: Slots<N, Link = L>>(&mut self, slots: &mut S, link: L) {
        N::set_next_free(slots.get_mut_ptr(link), self.head);
        self.head = link;
    }

    /// Pops the most recently pushed free slot.
    ///
    /// # Safety
    /// Every link on the chain must belong to `slots`.
    #[inline]
    pub unsafe fn pop<N: FreeNode<L>, S: Slots<N, Link = L>>(&mut self, slots: &mut S) -> Option<L> {
        let head = self.peek()?;
        self.head = N::next_free(slots.get_ptr(head));
        Some(head)
    }

    /// Returns `true` if `link` is on the chain. This walks the whole chain.
    ///
    /// # Safety
    /// Every link on the chain must belong to `slots`.
    pub unsafe fn contains<N: FreeNode<L>, S: Slots<N, Link = L>>(&self, slots: &S, link: L) -> bool {
        let mut cur = self.head;
        while !cur.is_nil() {
            if cur == link {
                return true;
            }
            cur = N::next_free(slots.get_ptr(cur));
        }
        false
    }

    /// Counts the free slots. This walks the whole chain.
    ///
    /// # Safety
    /// Every link on the chain must belong to `slots`.
    pub unsafe fn count<N: FreeNode<L>, S: Slots<N, Link = L>>(&self, slots: &S) -> usize {
        let mut n = 0;
        let mut cur = self.head;
        while !cur.is_nil() {
            n += 1;
            cur = N::next_free(slots.get_ptr(cur));
        }
        n
    }
}

/// A capacity policy: decides where slot records live and whether their
/// number may change after construction.
///
/// # Safety
/// Implementors must uphold the [`Slots`] contract for [`Policy::Slots`],
/// and must only ever register slots that hold no live element.
pub unsafe trait Policy: Sized {
    /// The link type used by every container of this policy.
    type Link: Link;
    /// The slot container for nodes of type `N`.
    type Slots<N>: Slots<N, Link = Self::Link>;
    /// Whether [`grow`](Policy::grow) can ever succeed.
    const GROWABLE: bool;

    /// Creates a container and registers its initial slots with `free`.
    fn new_slots<N: FreeNode<Self::Link>>(free: &mut FreeChain<Self::Link>) -> Self::Slots<N>;

    /// Adds one allocation unit of slots and registers them with `free`.
    /// Returns `false` if no slots could be added.
    fn grow<N: FreeNode<Self::Link>>(slots: &mut Self::Slots<N>, free: &mut FreeChain<Self::Link>) -> bool;

    /// Releases unused capacity down to `max(len, target)`, never touching a
    /// live element.
    ///
    /// # Safety
    /// `free` must be the complete free chain of `slots`, and `len` the
    /// number of occupied slots.
    unsafe fn shrink<N: FreeNode<Self::Link>>(
        slots: &mut Self::Slots<N>,
        free: &mut FreeChain<Self::Link>,
        len: usize,
        target: usize,
    );

    /// Releases every slot the container can reach. Slots that are neither
    /// on `free` nor owned by a larger allocation unit are leaked.
    ///
    /// # Safety
    /// No slot may hold a live element that is still expected to be dropped,
    /// and the container must not be used afterwards except to be dropped.
    unsafe fn release<N: FreeNode<Self::Link>>(slots: &mut Self::Slots<N>, free: &mut FreeChain<Self::Link>);
}

/// Marker for policies whose capacity can change after construction.
///
/// Pools built on these policies offer `reserve`, `shrink_to_fit` and
/// ownership transfer.
pub trait Growable: Policy {}

/// The static capacity policy: `N` slot records stored inline, addressed by
/// index type `I`.
pub struct Static<I, const N: usize>(PhantomData<I>);

/// Inline storage for the [`Static`] policy.
pub struct InlineSlots<T, I, const N: usize> {
    nodes: [MaybeUninit<T>; N],
    index: PhantomData<I>,
}

impl<T, I: Capacity + Link, const N: usize> InlineSlots<T, I, N> {
    #[inline]
    fn new() -> Self {
        if N >= I::MAX_REPRESENTABLE {
            buffer_too_large_for_index_type::<I>();
        }

        InlineSlots {
            nodes: unsafe { MaybeUninit::uninit().assume_init() },
            index: PhantomData,
        }
    }

    /// Returns the link for the slot at position `index`.
    #[inline]
    pub(crate) fn link_at(index: usize) -> I {
        I::from_usize(index)
    }
}

unsafe impl<T, I: Capacity + Link, const N: usize> Slots<T> for InlineSlots<T, I, N> {
    type Link = I;

    #[inline]
    fn capacity(&self) -> usize {
        N
    }

    #[inline]
    unsafe fn node_ptr(this: *mut Self, link: I) -> *mut T {
        let index = link.as_usize();
        debug_assert!(index < N);
        addr_of_mut!((*this).nodes).cast::<T>().add(index)
    }

    #[inline]
    #[track_caller]
    fn link_of(&self, node: *const T) -> I {
        let base = self.nodes.as_ptr() as usize;
        let addr = node as usize;
        let size = core::mem::size_of::<T>();
        if addr < base || addr >= base + N * size || (addr - base) % size != 0 {
            pointer_not_owned_by_pool();
        }
        I::from_usize((addr - base) / size)
    }
}

#[inline(never)]
#[cold]
#[track_caller]
fn pointer_not_owned_by_pool() -> ! {
    panic!("pointer does not refer to a slot of this pool")
}

unsafe impl<I: Capacity + Link, const N: usize> Policy for Static<I, N> {
    type Link = I;
    type Slots<T> = InlineSlots<T, I, N>;
    const GROWABLE: bool = false;

    fn new_slots<T: FreeNode<I>>(free: &mut FreeChain<I>) -> InlineSlots<T, I, N> {
        let mut slots = InlineSlots::new();
        for i in (0..N).rev() {
            unsafe { free.push(&mut slots, InlineSlots::<T, I, N>::link_at(i)) };
        }
        slots
    }

    #[inline]
    fn grow<T: FreeNode<I>>(_: &mut InlineSlots<T, I, N>, _: &mut FreeChain<I>) -> bool {
        false
    }

    #[inline]
    unsafe fn shrink<T: FreeNode<I>>(_: &mut InlineSlots<T, I, N>, _: &mut FreeChain<I>, _: usize, _: usize) {}

    #[inline]
    unsafe fn release<T: FreeNode<I>>(_: &mut InlineSlots<T, I, N>, free: &mut FreeChain<I>) {
        free.reset();
    }
}
