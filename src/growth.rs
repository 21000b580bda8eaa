//! Allocation strategies for pools whose capacity can change.
//!
//! [`Dynamic`] acquires one slot record per allocation, [`Blocks`] acquires
//! `B` of them at once. Both obtain raw memory from a [`RawMemory`]
//! provider, which defaults to the global allocator when the `alloc`
//! feature is enabled.

use core::alloc::Layout;
use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::ptr::{self, NonNull};

use crate::storage::{FreeChain, FreeNode, Growable, Link, Policy, RawLink, Slots};

/// A provider of raw, uninitialized memory blocks.
///
/// # Safety
/// [`allocate`](RawMemory::allocate) must return either `None` or a pointer
/// to a block that fits `layout` and stays valid until it is passed to
/// [`deallocate`](RawMemory::deallocate) with the same layout.
pub unsafe trait RawMemory {
    /// Allocates a block fitting `layout`. Returns [`None`] on failure.
    fn allocate(layout: Layout) -> Option<NonNull<u8>>;

    /// Releases a block previously returned by [`allocate`](RawMemory::allocate).
    ///
    /// # Safety
    /// `ptr` must have been returned by `allocate(layout)` and not been
    /// released since.
    unsafe fn deallocate(ptr: NonNull<u8>, layout: Layout);
}

/// The global allocator as a [`RawMemory`] provider.
#[cfg(feature = "alloc")]
#[cfg_attr(docs_rs, doc(cfg(feature = "alloc")))]
#[derive(Copy, Clone, Debug, Default)]
pub struct Global;

#[cfg(feature = "alloc")]
unsafe impl RawMemory for Global {
    #[inline]
    fn allocate(layout: Layout) -> Option<NonNull<u8>> {
        debug_assert!(layout.size() > 0);
        NonNull::new(unsafe { alloc::alloc::alloc(layout) })
    }

    #[inline]
    unsafe fn deallocate(ptr: NonNull<u8>, layout: Layout) {
        alloc::alloc::dealloc(ptr.as_ptr(), layout)
    }
}

/// The single-slot allocation strategy: every growth step allocates exactly
/// one slot record, every shrink step releases one.
pub struct Dynamic<M>(PhantomData<M>);

/// Slot container of the [`Dynamic`] policy.
///
/// Individual nodes are not tracked here; they are reachable only through
/// the free chain or the algorithm's used set.
pub struct NodeSlots<N, M> {
    capacity: usize,
    nodes: PhantomData<(*mut N, M)>,
}

unsafe impl<N, M: RawMemory> Slots<N> for NodeSlots<N, M> {
    type Link = RawLink;

    #[inline]
    fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    unsafe fn node_ptr(_: *mut Self, link: RawLink) -> *mut N {
        debug_assert!(!link.is_nil());
        link.node()
    }

    #[inline]
    fn link_of(&self, node: *const N) -> RawLink {
        RawLink::from_node(node as *mut N)
    }
}

unsafe impl<M: RawMemory> Policy for Dynamic<M> {
    type Link = RawLink;
    type Slots<N> = NodeSlots<N, M>;
    const GROWABLE: bool = true;

    #[inline]
    fn new_slots<N: FreeNode<RawLink>>(_: &mut FreeChain<RawLink>) -> NodeSlots<N, M> {
        NodeSlots {
            capacity: 0,
            nodes: PhantomData,
        }
    }

    fn grow<N: FreeNode<RawLink>>(slots: &mut NodeSlots<N, M>, free: &mut FreeChain<RawLink>) -> bool {
        let layout = Layout::new::<N>();
        match M::allocate(layout) {
            Some(ptr) => {
                unsafe { free.push(slots, RawLink::from_node(ptr.as_ptr().cast::<N>())) };
                slots.capacity += 1;
                log::trace!("pool grew by one slot to capacity {}", slots.capacity);
                true
            }
            None => {
                log::debug!("failed to allocate a slot of {} bytes", layout.size());
                false
            }
        }
    }

    unsafe fn shrink<N: FreeNode<RawLink>>(
        slots: &mut NodeSlots<N, M>,
        free: &mut FreeChain<RawLink>,
        len: usize,
        target: usize,
    ) {
        let floor = len.max(target);
        let before = slots.capacity;
        while slots.capacity > floor {
            match free.pop(slots) {
                Some(link) => {
                    M::deallocate(NonNull::new_unchecked(link.0), Layout::new::<N>());
                    slots.capacity -= 1;
                }
                None => break,
            }
        }
        log::trace!("pool shrank from {} to {} slots", before, slots.capacity);
    }

    unsafe fn release<N: FreeNode<RawLink>>(slots: &mut NodeSlots<N, M>, free: &mut FreeChain<RawLink>) {
        while let Some(link) = free.pop(slots) {
            M::deallocate(NonNull::new_unchecked(link.0), Layout::new::<N>());
            slots.capacity -= 1;
        }
    }
}

impl<M: RawMemory> Growable for Dynamic<M> {}

/// The block allocation strategy: every growth step allocates `B` slot
/// records at once.
///
/// Blocks can only be released while the pool is empty, since a block
/// cannot be partially freed.
pub struct Blocks<M, const B: usize>(PhantomData<M>);

struct Block<N, const B: usize> {
    next: *mut Block<N, B>,
    nodes: [MaybeUninit<N>; B],
}

/// Slot container of the [`Blocks`] policy: a chain of blocks, newest first.
pub struct BlockSlots<N, M, const B: usize> {
    head: *mut Block<N, B>,
    capacity: usize,
    memory: PhantomData<M>,
}

impl<N, M: RawMemory, const B: usize> BlockSlots<N, M, B> {
    const NON_EMPTY_BLOCKS: () = assert!(B > 0, "block size must be greater than zero");

    /// Returns the number of blocks in the chain.
    pub fn blocks(&self) -> usize {
        self.capacity / B
    }

    /// Registers every slot of `block` with `free`, so that the slot at
    /// the lowest address ends up on top.
    unsafe fn register(&mut self, block: *mut Block<N, B>, free: &mut FreeChain<RawLink>)
    where
        N: FreeNode<RawLink>,
    {
        let nodes = ptr::addr_of_mut!((*block).nodes).cast::<N>();
        for i in (0..B).rev() {
            free.push(self, RawLink::from_node(nodes.add(i)));
        }
    }

    unsafe fn pop_block(&mut self) {
        let block = self.head;
        self.head = (*block).next;
        self.capacity -= B;
        M::deallocate(NonNull::new_unchecked(block.cast()), Layout::new::<Block<N, B>>());
    }
}

unsafe impl<N, M: RawMemory, const B: usize> Slots<N> for BlockSlots<N, M, B> {
    type Link = RawLink;

    #[inline]
    fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    unsafe fn node_ptr(_: *mut Self, link: RawLink) -> *mut N {
        debug_assert!(!link.is_nil());
        link.node()
    }

    #[inline]
    fn link_of(&self, node: *const N) -> RawLink {
        RawLink::from_node(node as *mut N)
    }
}

unsafe impl<M: RawMemory, const B: usize> Policy for Blocks<M, B> {
    type Link = RawLink;
    type Slots<N> = BlockSlots<N, M, B>;
    const GROWABLE: bool = true;

    #[inline]
    fn new_slots<N: FreeNode<RawLink>>(_: &mut FreeChain<RawLink>) -> BlockSlots<N, M, B> {
        #[allow(clippy::let_unit_value)]
        let () = BlockSlots::<N, M, B>::NON_EMPTY_BLOCKS;
        BlockSlots {
            head: ptr::null_mut(),
            capacity: 0,
            memory: PhantomData,
        }
    }

    fn grow<N: FreeNode<RawLink>>(slots: &mut BlockSlots<N, M, B>, free: &mut FreeChain<RawLink>) -> bool {
        let layout = Layout::new::<Block<N, B>>();
        let block = match M::allocate(layout) {
            Some(ptr) => ptr.as_ptr().cast::<Block<N, B>>(),
            None => {
                log::debug!("failed to allocate a block of {} slots ({} bytes)", B, layout.size());
                return false;
            }
        };

        unsafe {
            ptr::addr_of_mut!((*block).next).write(slots.head);
            slots.head = block;
            slots.register(block, free);
        }
        slots.capacity += B;
        log::trace!("pool grew by a block of {} slots to capacity {}", B, slots.capacity);
        true
    }

    unsafe fn shrink<N: FreeNode<RawLink>>(
        slots: &mut BlockSlots<N, M, B>,
        free: &mut FreeChain<RawLink>,
        len: usize,
        target: usize,
    ) {
        if len != 0 {
            log::trace!("pool with {} live elements keeps all of its blocks", len);
            return;
        }

        let before = slots.capacity;
        while !slots.head.is_null() && slots.capacity - B >= target {
            slots.pop_block();
        }

        free.reset();
        let mut block = slots.head;
        while !block.is_null() {
            slots.register(block, free);
            block = (*block).next;
        }
        log::trace!("pool shrank from {} to {} slots", before, slots.capacity);
    }

    unsafe fn release<N: FreeNode<RawLink>>(slots: &mut BlockSlots<N, M, B>, free: &mut FreeChain<RawLink>) {
        free.reset();
        while !slots.head.is_null() {
            slots.pop_block();
        }
    }
}

impl<M: RawMemory, const B: usize> Growable for Blocks<M, B> {}
