//! The pool facade and its configuration flags.
//!
//! A [`Pool`] composes a capacity [`Policy`], a node-management
//! [`Algorithm`] and a set of behavior [`flags`] into a single object that
//! hands out and reclaims storage for values of one type. All composition
//! happens at compile time; there is no dynamic dispatch anywhere.
//!
//! Elements are referred to by [`PoolPtr`]s, which are plain pointers: they
//! stay valid until the element is destroyed or the pool is dropped,
//! regardless of what happens to other elements. [`Static`](crate::Static)
//! pools store their slots inline, so moving such a pool by value also
//! invalidates every pointer into it; growable pools keep their slots on
//! the heap, and their pointers survive [`take`](Pool::take) and
//! [`assign_from`](Pool::assign_from). Dereferencing a `PoolPtr` is
//! therefore `unsafe`, just like destroying through one.

use core::fmt::{Debug, Formatter};
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::mem::{self, needs_drop};
use core::ptr::NonNull;

use crate::algorithm::{Algorithm, Enumerate, SlotsOf, Traversal};
use crate::iter::{CursorMut, Iter, IterMut};
use crate::storage::{Growable, Policy, Slots};
use crate::PoolError;

/// Behavior flags, combined with `|` into the `F` parameter of a [`Pool`].
///
/// # Examples
/// ```
/// use slotpool::{flags, SPoolDlist};
///
/// let mut pool = SPoolDlist::<u8, 1, { flags::CREATE_RAISES }>::new();
/// pool.create(1);
/// assert!(std::panic::catch_unwind(move || { pool.create(2); }).is_err());
/// ```
pub mod flags {
    /// Don't drop live elements when the pool is dropped.
    ///
    /// Implied for element types without drop glue. Slot storage is released
    /// either way.
    pub const SKIP_TEARDOWN: u32 = 1 << 0;
    /// Never grow in `create`; only [`reserve`](super::Pool::reserve) adds
    /// capacity.
    pub const FIXED_CAPACITY: u32 = 1 << 1;
    /// Make move-assignment from the pool itself a no-op.
    ///
    /// [`assign_from`](super::Pool::assign_from) takes its source by unique
    /// reference, so self-assignment cannot be expressed; the guard is
    /// always in effect and this flag only exists for completeness.
    pub const SELF_MOVE_GUARD: u32 = 1 << 2;
    /// Panic with [`PoolError::Exhausted`](crate::PoolError::Exhausted) when
    /// `create` finds no free slot, instead of returning `None`.
    pub const CREATE_RAISES: u32 = 1 << 3;
    /// Return [`PoolError::AllocFailed`](crate::PoolError::AllocFailed)
    /// from [`reserve`](super::Pool::reserve) when the requested capacity
    /// could not be reached, instead of `Ok(())`.
    pub const RESERVE_RAISES: u32 = 1 << 4;
}

/// A pointer to a live element of a [`Pool`].
///
/// This is the pool's "element reference": it is returned by
/// [`Pool::create`] and accepted by [`Pool::destroy`]. It carries no
/// lifetime, so the borrow checker cannot tell when it dangles. Pointers
/// into a static pool dangle as soon as the pool value is moved.
pub struct PoolPtr<T> {
    ptr: NonNull<T>,
}

impl<T> PoolPtr<T> {
    #[inline]
    pub(crate) fn new(ptr: *mut T) -> Self {
        debug_assert!(!ptr.is_null());
        PoolPtr {
            ptr: unsafe { NonNull::new_unchecked(ptr) },
        }
    }

    /// Returns the raw pointer to the element.
    #[inline]
    pub fn as_ptr(self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Returns a shared reference to the element.
    ///
    /// # Safety
    /// The element must still be alive, and must not be mutably borrowed
    /// for the duration of `'a`.
    #[inline]
    pub unsafe fn as_ref<'a>(self) -> &'a T {
        &*self.ptr.as_ptr()
    }

    /// Returns a unique reference to the element.
    ///
    /// # Safety
    /// The element must still be alive, and must not be borrowed otherwise
    /// for the duration of `'a`.
    #[inline]
    pub unsafe fn as_mut<'a>(self) -> &'a mut T {
        &mut *self.ptr.as_ptr()
    }
}

impl<T> Clone for PoolPtr<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PoolPtr<T> {}

impl<T> PartialEq for PoolPtr<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T> Eq for PoolPtr<T> {}

impl<T> Hash for PoolPtr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ptr.hash(state)
    }
}

impl<T> Debug for PoolPtr<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("PoolPtr").field(&self.ptr).finish()
    }
}

/// A fixed-element-size object pool.
///
/// * `T` is the element type.
/// * `A` is the node-management [`Algorithm`]: [`List`](crate::algorithm::List),
///   [`Bitset`](crate::algorithm::Bitset) or [`Dlist`](crate::algorithm::Dlist).
/// * `P` is the capacity [`Policy`]: [`Static`](crate::storage::Static),
///   [`Dynamic`](crate::growth::Dynamic) or [`Blocks`](crate::growth::Blocks).
/// * `F` is a combination of [`flags`].
///
/// Most code will use one of the aliases in the crate root instead of
/// naming all four parameters.
///
/// # Examples
/// ```
/// use slotpool::SPoolDlist;
///
/// let mut pool = SPoolDlist::<&str, 2>::new();
/// let a = pool.create("apple").unwrap();
/// let b = pool.create("banana").unwrap();
/// assert!(pool.create("cherry").is_none());
///
/// assert_eq!(unsafe { *a.as_ref() }, "apple");
/// unsafe { pool.destroy(a) };
/// assert_eq!(pool.iter().copied().collect::<Vec<_>>(), ["banana"]);
/// # let _ = b;
/// ```
pub struct Pool<T, A: Algorithm<T, P>, P: Policy, const F: u32 = 0> {
    pub(crate) state: A::State,
    pub(crate) slots: SlotsOf<T, A, P>,
    pub(crate) len: usize,
    items: PhantomData<T>,
}

impl<T, A: Algorithm<T, P>, P: Policy, const F: u32> Pool<T, A, P, F> {
    const CAN_AUTO_GROW: bool = P::GROWABLE && F & flags::FIXED_CAPACITY == 0;
    const DROP_ON_TEARDOWN: bool = F & flags::SKIP_TEARDOWN == 0 && needs_drop::<T>();

    /// Constructs an empty pool.
    ///
    /// Static pools start with all of their slots free, growable pools
    /// start with no slots at all.
    ///
    /// # Panics
    /// Panics if a static pool's capacity is not strictly less than the
    /// largest value its index type can represent.
    pub fn new() -> Self {
        let mut state = A::new_state();
        let slots = P::new_slots::<A::Node>(A::free_chain(&mut state));
        Pool {
            state,
            slots,
            len: 0,
            items: PhantomData,
        }
    }

    /// Returns the number of live elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns the number of slots the pool currently owns.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Returns `true` if the pool holds no live elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if every slot holds a live element.
    ///
    /// A pool without any slots is both empty and full.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Moves `value` into a free slot and returns a pointer to it.
    ///
    /// If no slot is free, a growable pool without the
    /// [`FIXED_CAPACITY`](flags::FIXED_CAPACITY) flag first tries to grow.
    /// Returns `None` if that fails or isn't allowed.
    ///
    /// # Panics
    /// Panics instead of returning `None` if the pool has the
    /// [`CREATE_RAISES`](flags::CREATE_RAISES) flag.
    #[inline]
    #[track_caller]
    pub fn create(&mut self, value: T) -> Option<PoolPtr<T>> {
        self.create_with(move || value)
    }

    /// Constructs a value with `f` directly in a free slot and returns a
    /// pointer to it.
    ///
    /// `f` is not called if there is no free slot. If `f` panics, the pool is
    /// left unchanged.
    ///
    /// # Panics
    /// Panics if `f` panics, or if the pool is exhausted and has the
    /// [`CREATE_RAISES`](flags::CREATE_RAISES) flag.
    #[track_caller]
    pub fn create_with<G: FnOnce() -> T>(&mut self, f: G) -> Option<PoolPtr<T>> {
        match self.try_create_with(f) {
            Ok(ptr) => Some(ptr),
            Err(err) if F & flags::CREATE_RAISES != 0 => creation_failed(err),
            Err(_) => None,
        }
    }

    /// Moves `value` into a free slot and returns a pointer to it, or
    /// [`PoolError::Exhausted`] if no slot can be made available. Never
    /// panics, regardless of flags.
    ///
    /// # Examples
    /// ```
    /// use slotpool::{PoolError, SPoolList};
    ///
    /// let mut pool = SPoolList::<u32, 1>::new();
    /// assert!(pool.try_create(1).is_ok());
    /// assert_eq!(pool.try_create(2), Err(PoolError::Exhausted));
    /// ```
    #[inline]
    pub fn try_create(&mut self, value: T) -> crate::Result<PoolPtr<T>> {
        self.try_create_with(move || value)
    }

    /// Like [`create_with`](Pool::create_with), but reports exhaustion as an
    /// error value.
    pub fn try_create_with<G: FnOnce() -> T>(&mut self, f: G) -> crate::Result<PoolPtr<T>> {
        if Self::CAN_AUTO_GROW && A::next_free(&self.state).is_none() {
            P::grow(&mut self.slots, A::free_chain(&mut self.state));
        }

        let link = unsafe { A::create(&mut self.state, &mut self.slots, f) }.ok_or(PoolError::Exhausted)?;
        self.len += 1;
        Ok(PoolPtr::new(unsafe { A::value_ptr(&mut self.slots, link) }))
    }

    /// Destroys the element behind `obj` and frees its slot. Passing
    /// [`None`] is a no-op.
    ///
    /// # Safety
    /// `obj` must have been returned by this pool, and the element must not
    /// have been destroyed since. Static pools check that the pointer lies
    /// within their storage and panic if it doesn't.
    ///
    /// # Examples
    /// ```
    /// use slotpool::PoolDlist;
    ///
    /// let mut pool = PoolDlist::<String>::new();
    /// let p = pool.create(String::from("x"));
    /// unsafe {
    ///     pool.destroy(p);
    ///     pool.destroy(None);
    /// }
    /// assert!(pool.is_empty());
    /// ```
    #[inline]
    #[track_caller]
    pub unsafe fn destroy(&mut self, obj: impl Into<Option<PoolPtr<T>>>) {
        if let Some(ptr) = obj.into() {
            drop(self.remove(ptr));
        }
    }

    /// Moves the element behind `ptr` out of the pool and frees its slot.
    ///
    /// # Safety
    /// Same as [`destroy`](Pool::destroy).
    #[track_caller]
    pub unsafe fn remove(&mut self, ptr: PoolPtr<T>) -> T {
        let link = self.slots.link_of(ptr.as_ptr().cast::<A::Node>());
        let value = A::remove(&mut self.state, &mut self.slots, link);
        self.len -= 1;
        value
    }

    /// Returns a mutable cursor positioned on the element behind `ptr`.
    ///
    /// # Safety
    /// Same as [`destroy`](Pool::destroy).
    #[track_caller]
    pub unsafe fn cursor_at_mut(&mut self, ptr: PoolPtr<T>) -> CursorMut<'_, T, A, P, F>
    where
        A: Traversal<T, P>,
    {
        let link = self.slots.link_of(ptr.as_ptr().cast::<A::Node>());
        CursorMut::new(self, link)
    }
}

impl<T, A: Enumerate<T, P>, P: Policy, const F: u32> Pool<T, A, P, F> {
    /// Destroys every live element. Calling it on an empty pool is a no-op.
    ///
    /// Available for the doubly-linked and bitset algorithms, and for
    /// static singly-linked pools, where it takes O(N²) time unless the pool
    /// is full.
    pub fn destroy_all(&mut self) {
        unsafe { A::destroy_all(&mut self.state, &mut self.slots, &mut self.len, true) };
    }

    /// Calls `f` on every live element.
    ///
    /// # Examples
    /// ```
    /// use slotpool::SPoolList;
    ///
    /// let mut pool = SPoolList::<u32, 4>::new();
    /// for i in 1..=3 {
    ///     pool.create(i);
    /// }
    ///
    /// let mut sum = 0;
    /// pool.for_each(|x| sum += *x);
    /// assert_eq!(sum, 6);
    /// ```
    pub fn for_each<G: FnMut(&mut T)>(&mut self, mut f: G) {
        unsafe { A::for_each(&self.state, &mut self.slots, self.len, |item| f(&mut *item)) };
    }
}

impl<T, A: Traversal<T, P>, P: Policy, const F: u32> Pool<T, A, P, F> {
    /// Returns an iterator over shared references to the live elements.
    ///
    /// Doubly-linked pools yield elements in creation order, bitset pools
    /// in slot order.
    #[inline]
    pub fn iter(&self) -> Iter<'_, T, A, P> {
        Iter::new(&self.state, &self.slots, self.len)
    }

    /// Returns an iterator over unique references to the live elements.
    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_, T, A, P> {
        IterMut::new(&self.state, &mut self.slots, self.len)
    }

    /// Returns a cursor positioned on the first live element, or on the
    /// "ghost" position if the pool is empty.
    #[inline]
    pub fn cursor_front_mut(&mut self) -> CursorMut<'_, T, A, P, F> {
        let first = A::first(&self.state);
        CursorMut::new(self, first)
    }

    /// Returns a cursor positioned on the last live element, or on the
    /// "ghost" position if the pool is empty.
    #[inline]
    pub fn cursor_back_mut(&mut self) -> CursorMut<'_, T, A, P, F> {
        let last = A::last(&self.state);
        CursorMut::new(self, last)
    }
}

impl<T, A: Algorithm<T, P>, P: Growable, const F: u32> Pool<T, A, P, F> {
    /// Grows the pool until it owns at least `capacity` slots. Does nothing
    /// if it already does.
    ///
    /// Growth happens in the policy's allocation units, so the resulting
    /// capacity may exceed the request. If an allocation fails, the pool
    /// keeps whatever it acquired up to that point.
    ///
    /// # Errors
    /// Returns [`PoolError::AllocFailed`] on a shortfall if the pool has the
    /// [`RESERVE_RAISES`](flags::RESERVE_RAISES) flag, and `Ok(())`
    /// otherwise.
    ///
    /// # Examples
    /// ```
    /// use slotpool::PoolListBlock;
    ///
    /// let mut pool = PoolListBlock::<u64, 8>::new();
    /// pool.reserve(10).unwrap();
    /// assert_eq!(pool.capacity(), 16);
    /// ```
    pub fn reserve(&mut self, capacity: usize) -> crate::Result<()> {
        while self.capacity() < capacity {
            if !P::grow(&mut self.slots, A::free_chain(&mut self.state)) {
                break;
            }
        }

        let reached = self.capacity();
        if reached >= capacity {
            return Ok(());
        }

        log::debug!("reserve stopped at {} of {} requested slots", reached, capacity);
        if F & flags::RESERVE_RAISES != 0 {
            Err(PoolError::AllocFailed {
                requested: capacity,
                capacity: reached,
            })
        } else {
            Ok(())
        }
    }

    /// Releases unused slots until the pool owns `max(self.len(), capacity)`
    /// of them, as far as the policy allows. Never touches a live element.
    ///
    /// Block pools only release storage while they are empty.
    pub fn shrink_to_fit(&mut self, capacity: usize) {
        unsafe { P::shrink(&mut self.slots, A::free_chain(&mut self.state), self.len, capacity) };
    }

    /// Transfers every element and slot into a new pool, leaving `self`
    /// empty with no capacity. Pointers into the pool stay valid.
    ///
    /// # Examples
    /// ```
    /// use slotpool::PoolDlist;
    ///
    /// let mut a = PoolDlist::<u32>::new();
    /// let p = a.create(5).unwrap();
    ///
    /// let b = a.take();
    /// assert_eq!((a.len(), a.capacity()), (0, 0));
    /// assert_eq!(b.len(), 1);
    /// assert_eq!(unsafe { *p.as_ref() }, 5);
    /// ```
    #[inline]
    pub fn take(&mut self) -> Self {
        mem::replace(self, Self::new())
    }

    /// Tears down `self`, then transfers every element and slot of `other`
    /// into it, leaving `other` empty with no capacity.
    #[inline]
    pub fn assign_from(&mut self, other: &mut Self) {
        *self = other.take();
    }
}

impl<T, A: Algorithm<T, P>, P: Policy, const F: u32> Default for Pool<T, A, P, F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, A: Algorithm<T, P>, P: Policy, const F: u32> Drop for Pool<T, A, P, F> {
    fn drop(&mut self) {
        unsafe {
            A::teardown(&mut self.state, &mut self.slots, self.len, Self::DROP_ON_TEARDOWN);
            P::release(&mut self.slots, A::free_chain(&mut self.state));
        }
    }
}

impl<T, A: Algorithm<T, P>, P: Policy, const F: u32> Debug for Pool<T, A, P, F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pool")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .field("next_free", &A::next_free(&self.state))
            .finish()
    }
}

impl<'a, T, A: Traversal<T, P>, P: Policy, const F: u32> IntoIterator for &'a Pool<T, A, P, F> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T, A, P>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, A: Traversal<T, P>, P: Policy, const F: u32> IntoIterator for &'a mut Pool<T, A, P, F> {
    type Item = &'a mut T;
    type IntoIter = IterMut<'a, T, A, P>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

#[inline(never)]
#[cold]
#[track_caller]
fn creation_failed(err: PoolError) -> ! {
    panic!("cannot create element: {}", err)
}

#[cfg(all(test, feature = "alloc"))]
mod suite;
