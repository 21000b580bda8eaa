//! Iterators and cursors over the live elements of a pool.
//!
//! These are available for algorithms implementing [`Traversal`], i.e. the
//! doubly-linked and bitset pools.

use core::fmt::{Debug, Formatter};
use core::iter::FusedIterator;
use core::marker::PhantomData;

use crate::algorithm::{Algorithm, SlotsOf, Traversal};
use crate::pool::{Pool, PoolPtr};
use crate::storage::{Link, Policy};

/// An iterator over shared references to the live elements of a pool.
///
/// This struct is created by [`Pool::iter`], see its documentation for more.
pub struct Iter<'a, T, A: Traversal<T, P>, P: Policy> {
    state: &'a A::State,
    slots: &'a SlotsOf<T, A, P>,
    front: P::Link,
    back: P::Link,
    remaining: usize,
    items: PhantomData<&'a T>,
}

impl<'a, T, A: Traversal<T, P>, P: Policy> Iter<'a, T, A, P> {
    pub(crate) fn new(state: &'a A::State, slots: &'a SlotsOf<T, A, P>, len: usize) -> Self {
        Iter {
            state,
            slots,
            front: A::first(state),
            back: A::last(state),
            remaining: len,
            items: PhantomData,
        }
    }

    #[inline]
    fn slots_ptr(&self) -> *mut SlotsOf<T, A, P> {
        self.slots as *const _ as *mut _
    }
}

impl<'a, T, A: Traversal<T, P>, P: Policy> Iterator for Iter<'a, T, A, P> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let link = self.front;
        self.remaining -= 1;
        unsafe {
            if self.remaining > 0 {
                self.front = A::next(self.state, self.slots_ptr(), link);
            }
            Some(&*A::value_ptr(self.slots_ptr(), link))
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T, A: Traversal<T, P>, P: Policy> DoubleEndedIterator for Iter<'_, T, A, P> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let link = self.back;
        self.remaining -= 1;
        unsafe {
            if self.remaining > 0 {
                self.back = A::prev(self.state, self.slots_ptr(), link);
            }
            Some(&*A::value_ptr(self.slots_ptr(), link))
        }
    }
}

impl<T, A: Traversal<T, P>, P: Policy> ExactSizeIterator for Iter<'_, T, A, P> {}
impl<T, A: Traversal<T, P>, P: Policy> FusedIterator for Iter<'_, T, A, P> {}

impl<T, A: Traversal<T, P>, P: Policy> Clone for Iter<'_, T, A, P> {
    fn clone(&self) -> Self {
        Iter { ..*self }
    }
}

/// An iterator over unique references to the live elements of a pool.
///
/// This struct is created by [`Pool::iter_mut`], see its documentation for more.
pub struct IterMut<'a, T, A: Traversal<T, P>, P: Policy> {
    state: &'a A::State,
    slots: *mut SlotsOf<T, A, P>,
    front: P::Link,
    back: P::Link,
    remaining: usize,
    items: PhantomData<&'a mut T>,
}

impl<'a, T, A: Traversal<T, P>, P: Policy> IterMut<'a, T, A, P> {
    pub(crate) fn new(state: &'a A::State, slots: &'a mut SlotsOf<T, A, P>, len: usize) -> Self {
        IterMut {
            state,
            slots,
            front: A::first(state),
            back: A::last(state),
            remaining: len,
            items: PhantomData,
        }
    }
}

impl<'a, T, A: Traversal<T, P>, P: Policy> Iterator for IterMut<'a, T, A, P> {
    type Item = &'a mut T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let link = self.front;
        self.remaining -= 1;
        unsafe {
            if self.remaining > 0 {
                self.front = A::next(self.state, self.slots, link);
            }
            Some(&mut *A::value_ptr(self.slots, link))
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T, A: Traversal<T, P>, P: Policy> DoubleEndedIterator for IterMut<'_, T, A, P> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let link = self.back;
        self.remaining -= 1;
        unsafe {
            if self.remaining > 0 {
                self.back = A::prev(self.state, self.slots, link);
            }
            Some(&mut *A::value_ptr(self.slots, link))
        }
    }
}

impl<T, A: Traversal<T, P>, P: Policy> ExactSizeIterator for IterMut<'_, T, A, P> {}
impl<T, A: Traversal<T, P>, P: Policy> FusedIterator for IterMut<'_, T, A, P> {}

/// An opaque position within a pool, as reported by [`CursorMut::position`].
///
/// Positions are only meaningful for the pool they were obtained from, and
/// only as long as the element they refer to is alive.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Position<L: Link>(L);

impl<L: Link> Position<L> {
    /// Returns `true` if this is the "ghost" position past the last and
    /// before the first element.
    #[inline]
    pub fn is_end(&self) -> bool {
        self.0.is_nil()
    }
}

impl<L: Link> Debug for Position<L> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        if self.is_end() {
            f.write_str("Position(end)")
        } else {
            f.debug_tuple("Position").field(&self.0).finish()
        }
    }
}

/// A cursor over the live elements of a pool that can destroy elements
/// as it goes.
///
/// The cursor always points to either a live element or the "ghost"
/// position, which sits between the last and the first element. Moving
/// forward from the ghost yields the first element, moving backward the
/// last.
///
/// # Examples
/// ```
/// use slotpool::SPoolDlist;
///
/// let mut pool = SPoolDlist::<u32, 8>::new();
/// for i in 0..6 {
///     pool.create(i);
/// }
///
/// let mut cursor = pool.cursor_front_mut();
/// while let Some(x) = cursor.current() {
///     if *x % 2 == 0 {
///         cursor.destroy_current();
///     } else {
///         cursor.move_next();
///     }
/// }
///
/// assert_eq!(pool.iter().copied().collect::<Vec<_>>(), [1, 3, 5]);
/// ```
pub struct CursorMut<'a, T, A: Traversal<T, P>, P: Policy, const F: u32> {
    pool: &'a mut Pool<T, A, P, F>,
    current: P::Link,
}

impl<'a, T, A: Traversal<T, P>, P: Policy, const F: u32> CursorMut<'a, T, A, P, F> {
    pub(crate) fn new(pool: &'a mut Pool<T, A, P, F>, current: P::Link) -> Self {
        CursorMut { pool, current }
    }

    /// Returns the element under the cursor, or `None` at the ghost
    /// position.
    #[inline]
    pub fn current(&mut self) -> Option<&mut T> {
        if self.current.is_nil() {
            return None;
        }
        unsafe { Some(&mut *A::value_ptr(&mut self.pool.slots, self.current)) }
    }

    /// Returns a pointer to the element under the cursor.
    #[inline]
    pub fn current_ptr(&mut self) -> Option<PoolPtr<T>> {
        if self.current.is_nil() {
            return None;
        }
        unsafe { Some(PoolPtr::new(A::value_ptr(&mut self.pool.slots, self.current))) }
    }

    /// Returns the cursor's position.
    #[inline]
    pub fn position(&self) -> Position<P::Link> {
        Position(self.current)
    }

    /// Moves the cursor to the next element, or from the last element to
    /// the ghost position, or from the ghost position to the first element.
    pub fn move_next(&mut self) {
        self.current = if self.current.is_nil() {
            A::first(&self.pool.state)
        } else {
            unsafe { A::next(&self.pool.state, &mut self.pool.slots, self.current) }
        };
    }

    /// Moves the cursor to the previous element, or from the first element
    /// to the ghost position, or from the ghost position to the last element.
    pub fn move_prev(&mut self) {
        self.current = if self.current.is_nil() {
            A::last(&self.pool.state)
        } else {
            unsafe { A::prev(&self.pool.state, &mut self.pool.slots, self.current) }
        };
    }

    /// Moves the element under the cursor out of the pool and advances the
    /// cursor to its successor. Returns `None` at the ghost position.
    pub fn remove_current(&mut self) -> Option<T> {
        if self.current.is_nil() {
            return None;
        }

        let pool = &mut *self.pool;
        let link = self.current;
        unsafe {
            self.current = A::next(&pool.state, &mut pool.slots, link);
            pool.len -= 1;
            Some(A::remove(&mut pool.state, &mut pool.slots, link))
        }
    }

    /// Destroys the element under the cursor and advances the cursor to its
    /// successor. Returns `false` at the ghost position.
    #[inline]
    pub fn destroy_current(&mut self) -> bool {
        self.remove_current().is_some()
    }

    /// Destroys elements starting at the cursor up to, but excluding, the
    /// element at `end`, and returns how many were destroyed. The cursor ends
    /// up at `end`.
    ///
    /// If `end` is not reached, everything up to the ghost position is
    /// destroyed.
    ///
    /// # Examples
    /// ```
    /// use slotpool::PoolDlistBlock;
    ///
    /// let mut pool = PoolDlistBlock::<char, 4>::new();
    /// for c in "abcdef".chars() {
    ///     pool.create(c);
    /// }
    ///
    /// let mut cursor = pool.cursor_front_mut();
    /// cursor.move_next();
    /// let start = cursor.position();
    /// for _ in 0..3 {
    ///     cursor.move_next();
    /// }
    /// let end = cursor.position();
    ///
    /// let mut cursor = pool.cursor_front_mut();
    /// while cursor.position() != start {
    ///     cursor.move_next();
    /// }
    /// assert_eq!(cursor.destroy_until(end), 3);
    /// assert_eq!(pool.iter().collect::<String>(), "aef");
    /// ```
    pub fn destroy_until(&mut self, end: Position<P::Link>) -> usize {
        let mut destroyed = 0;
        while self.current != end.0 && self.destroy_current() {
            destroyed += 1;
        }
        destroyed
    }
}

impl<T: Debug, A: Traversal<T, P>, P: Policy, const F: u32> Debug for CursorMut<'_, T, A, P, F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let slots = &self.pool.slots as *const _ as *mut SlotsOf<T, A, P>;
        let current = if self.current.is_nil() {
            None
        } else {
            Some(unsafe { &*<A as Algorithm<T, P>>::value_ptr(slots, self.current) })
        };
        f.debug_struct("CursorMut")
            .field("position", &self.position())
            .field("current", &current)
            .finish()
    }
}
