use std::mem::MaybeUninit;
use std::ptr::NonNull;

use crate::{Error, Result, SlotPool};

/// An element allocator for generic containers, backed by one [`SlotPool`] per element type.
///
/// This is the thin, mechanical face of the pool: the operations a node-based container expects
/// from its allocator - allocate/deallocate one element, construct and destroy in place, and
/// rebinding to a related element type. All the real bookkeeping lives in the pool underneath.
///
/// The pool has no notion of contiguous multi-element or placement-guided allocation, so
/// [`allocate()`](Self::allocate) serves exactly one element per call and rejects placement
/// hints. Slot acquisition and value construction are deliberately independent steps, as are
/// destruction and slot release.
///
/// # Example
///
/// ```
/// use slot_pool::PoolAllocator;
///
/// let mut alloc = PoolAllocator::<String>::new();
///
/// let slot = alloc.allocate(1, None).expect("allocation failed");
///
/// // SAFETY: The slot is a fresh, uninitialized allocation from this allocator.
/// unsafe { alloc.construct(slot, String::from("pooled")) };
///
/// // SAFETY: The slot holds the value constructed above.
/// unsafe {
///     assert_eq!(*slot.as_ptr(), "pooled");
/// }
///
/// // SAFETY: The value is initialized and dropped exactly once here.
/// unsafe { alloc.destroy(slot) };
///
/// // SAFETY: The slot came from this allocator and its value has been destroyed.
/// unsafe { alloc.deallocate(slot, 1) };
/// ```
#[derive(Debug)]
pub struct PoolAllocator<T, const GROW_SIZE: usize = 1024> {
    pool: SlotPool<T, GROW_SIZE>,
}

impl<T, const GROW_SIZE: usize> PoolAllocator<T, GROW_SIZE> {
    /// Creates an allocator with an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pool: SlotPool::new(),
        }
    }

    /// Allocates storage for `count` elements, optionally near `hint`.
    ///
    /// The underlying pool only supports single-slot allocation with no locality control, so
    /// the only request this can serve is `count == 1` with no hint. The returned slot is
    /// uninitialized; pair it with [`construct()`](Self::construct) and
    /// [`destroy()`](Self::destroy).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedRequest`] for `count != 1` or a present `hint`, without
    /// touching the pool, and [`Error::OutOfMemory`] if the pool cannot obtain storage for a
    /// new block.
    ///
    /// # Example
    ///
    /// ```
    /// use slot_pool::{Error, PoolAllocator};
    ///
    /// let mut alloc = PoolAllocator::<u64>::new();
    ///
    /// let slot = alloc.allocate(1, None).expect("allocation failed");
    /// assert!(matches!(alloc.allocate(2, None), Err(Error::UnsupportedRequest)));
    /// assert!(matches!(alloc.allocate(1, Some(slot)), Err(Error::UnsupportedRequest)));
    ///
    /// // SAFETY: The slot came from this allocator and holds no constructed value.
    /// unsafe { alloc.deallocate(slot, 1) };
    /// ```
    pub fn allocate(&mut self, count: usize, hint: Option<NonNull<T>>) -> Result<NonNull<T>> {
        if count != 1 || hint.is_some() {
            return Err(Error::UnsupportedRequest);
        }

        self.pool.allocate()
    }

    /// Releases storage for `count` elements starting at `slot`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the slot was returned by [`allocate()`](Self::allocate) on
    /// this same allocator, has not already been deallocated, and holds no live value. `count`
    /// is trusted to be 1, matching the only request shape `allocate()` serves; it is checked
    /// in debug builds only.
    pub unsafe fn deallocate(&mut self, slot: NonNull<T>, count: usize) {
        debug_assert_eq!(
            count, 1,
            "the pool allocator only ever hands out single-element allocations"
        );

        // SAFETY: Forwarding the caller's guarantee that the slot is an unreturned allocation
        // from this allocator's pool with no live value in it.
        unsafe { self.pool.deallocate(slot) };
    }

    /// Constructs a value in place in an allocated slot.
    ///
    /// Acquiring a slot does not construct anything; this is the separate step that does.
    ///
    /// # Safety
    ///
    /// The caller must ensure the slot is a live allocation for a `T` and currently holds no
    /// value that would be overwritten without being dropped.
    pub unsafe fn construct(&self, slot: NonNull<T>, value: T) {
        // SAFETY: Forwarding the caller's guarantees; the closure fully initializes the slot.
        unsafe {
            self.construct_with(slot, |uninit| {
                uninit.write(value);
            });
        }
    }

    /// Constructs a value in place using an initialization closure.
    ///
    /// This avoids building the value on the stack first, which matters for large elements.
    ///
    /// # Safety
    ///
    /// The caller must ensure the slot is a live allocation for a `T` holding no undropped
    /// value, and that the closure fully initializes the `MaybeUninit<T>` before returning.
    #[expect(
        clippy::unused_self,
        reason = "construction is an operation of the allocator contract, not of the slot"
    )]
    pub unsafe fn construct_with(&self, slot: NonNull<T>, f: impl FnOnce(&mut MaybeUninit<T>)) {
        let mut uninit = slot.cast::<MaybeUninit<T>>();

        // SAFETY: The slot is sized and aligned for a T (caller guarantee), and we create the
        // only reference to it for the duration of this call.
        f(unsafe { uninit.as_mut() });
    }

    /// Runs the destructor of the value in a slot, in place.
    ///
    /// Releasing a slot does not destroy anything; this is the separate step that does. The
    /// slot remains allocated afterwards and may be constructed into again or deallocated.
    ///
    /// # Safety
    ///
    /// The caller must ensure the slot holds an initialized `T` that is not used again after
    /// this call (until reconstructed).
    #[expect(
        clippy::unused_self,
        reason = "destruction is an operation of the allocator contract, not of the slot"
    )]
    pub unsafe fn destroy(&self, slot: NonNull<T>) {
        // SAFETY: Forwarding the caller's guarantee that the slot holds an initialized value.
        unsafe { slot.as_ptr().drop_in_place() };
    }

    /// Produces the analogous allocator for a related element type, with the same growth
    /// factor.
    ///
    /// The rebound allocator owns an independent pool; no storage is shared across element
    /// types.
    ///
    /// # Example
    ///
    /// ```
    /// use slot_pool::PoolAllocator;
    ///
    /// let node_alloc = PoolAllocator::<u64, 256>::new();
    /// let mut meta_alloc = node_alloc.rebind::<String>();
    ///
    /// let slot = meta_alloc.allocate(1, None).expect("allocation failed");
    /// // SAFETY: The slot came from `meta_alloc` and holds no constructed value.
    /// unsafe { meta_alloc.deallocate(slot, 1) };
    /// ```
    #[must_use]
    #[expect(
        clippy::unused_self,
        reason = "rebinding is an operation offered by an existing allocator instance"
    )]
    pub fn rebind<U>(&self) -> PoolAllocator<U, GROW_SIZE> {
        PoolAllocator::new()
    }

    /// The number of elements currently allocated and not yet released.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// Whether no elements are currently allocated.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}

impl<T, const GROW_SIZE: usize> Default for PoolAllocator<T, GROW_SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use std::cell::Cell;
    use std::fmt::Debug;
    use std::rc::Rc;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(PoolAllocator<u32>: Send, Debug, Default);
    assert_not_impl_any!(PoolAllocator<u32>: Sync, Clone);

    #[test]
    fn single_element_request_succeeds() {
        let mut alloc = PoolAllocator::<u64, 4>::new();

        let slot = alloc.allocate(1, None).expect("allocation failed");
        assert_eq!(alloc.len(), 1);

        unsafe { alloc.deallocate(slot, 1) };
        assert!(alloc.is_empty());
    }

    #[test]
    fn multi_element_request_is_rejected() {
        let mut alloc = PoolAllocator::<u64, 4>::new();

        assert!(matches!(
            alloc.allocate(2, None),
            Err(Error::UnsupportedRequest)
        ));
        assert!(matches!(
            alloc.allocate(0, None),
            Err(Error::UnsupportedRequest)
        ));

        // The pool was never touched.
        assert!(alloc.is_empty());
    }

    #[test]
    fn hinted_request_is_rejected() {
        let mut alloc = PoolAllocator::<u64, 4>::new();

        let slot = alloc.allocate(1, None).expect("allocation failed");

        assert!(matches!(
            alloc.allocate(1, Some(slot)),
            Err(Error::UnsupportedRequest)
        ));

        unsafe { alloc.deallocate(slot, 1) };
    }

    #[test]
    fn construct_and_destroy_round_trip() {
        let mut alloc = PoolAllocator::<String, 4>::new();

        let slot = alloc.allocate(1, None).expect("allocation failed");

        unsafe { alloc.construct(slot, String::from("node payload")) };
        unsafe {
            assert_eq!(*slot.as_ptr(), "node payload");
        }

        unsafe { alloc.destroy(slot) };
        unsafe { alloc.deallocate(slot, 1) };
    }

    #[test]
    fn destroy_runs_the_destructor() {
        struct Tracked {
            dropped: Rc<Cell<bool>>,
        }

        impl Drop for Tracked {
            fn drop(&mut self) {
                self.dropped.set(true);
            }
        }

        let dropped = Rc::new(Cell::new(false));
        let mut alloc = PoolAllocator::<Tracked, 4>::new();

        let slot = alloc.allocate(1, None).expect("allocation failed");
        unsafe {
            alloc.construct(
                slot,
                Tracked {
                    dropped: Rc::clone(&dropped),
                },
            );
        }

        assert!(!dropped.get());

        unsafe { alloc.destroy(slot) };
        assert!(dropped.get());

        unsafe { alloc.deallocate(slot, 1) };
    }

    #[test]
    fn construct_with_initializes_in_place() {
        let mut alloc = PoolAllocator::<[u64; 8], 4>::new();

        let slot = alloc.allocate(1, None).expect("allocation failed");

        unsafe {
            alloc.construct_with(slot, |uninit| {
                uninit.write([7; 8]);
            });
        }

        unsafe {
            assert_eq!(*slot.as_ptr(), [7; 8]);
        }

        unsafe { alloc.deallocate(slot, 1) };
    }

    #[test]
    fn slot_release_does_not_destroy() {
        struct Tracked {
            dropped: Rc<Cell<bool>>,
        }

        impl Drop for Tracked {
            fn drop(&mut self) {
                self.dropped.set(true);
            }
        }

        let dropped = Rc::new(Cell::new(false));
        let mut alloc = PoolAllocator::<Tracked, 4>::new();

        let slot = alloc.allocate(1, None).expect("allocation failed");
        unsafe {
            alloc.construct(
                slot,
                Tracked {
                    dropped: Rc::clone(&dropped),
                },
            );
        }

        // Destroy first, then release: release itself must not run the destructor again,
        // and the flag must have been set by destroy alone.
        unsafe { alloc.destroy(slot) };
        dropped.set(false);

        unsafe { alloc.deallocate(slot, 1) };
        assert!(!dropped.get());
    }

    #[test]
    fn rebound_allocator_is_independent() {
        let mut node_alloc = PoolAllocator::<u64, 4>::new();
        let mut meta_alloc = node_alloc.rebind::<String>();

        let node = node_alloc.allocate(1, None).expect("allocation failed");
        let meta = meta_alloc.allocate(1, None).expect("allocation failed");

        // Each allocator tracks only its own pool.
        assert_eq!(node_alloc.len(), 1);
        assert_eq!(meta_alloc.len(), 1);

        unsafe { meta_alloc.construct(meta, String::from("rebound")) };
        unsafe {
            assert_eq!(*meta.as_ptr(), "rebound");
        }

        unsafe { meta_alloc.destroy(meta) };
        unsafe { meta_alloc.deallocate(meta, 1) };
        unsafe { node_alloc.deallocate(node, 1) };
    }

    #[test]
    fn reuse_through_the_adapter_is_lifo() {
        let mut alloc = PoolAllocator::<u64, 4>::new();

        let a = alloc.allocate(1, None).expect("allocation failed");
        let b = alloc.allocate(1, None).expect("allocation failed");

        unsafe { alloc.deallocate(a, 1) };
        unsafe { alloc.deallocate(b, 1) };

        assert_eq!(alloc.allocate(1, None).expect("allocation failed"), b);
        assert_eq!(alloc.allocate(1, None).expect("allocation failed"), a);
    }
}
