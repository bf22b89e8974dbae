use std::ptr::NonNull;

use crate::{Block, Result};

/// The free-list link written over the start of a slot while it is unused.
///
/// While a slot is handed out, its entire region belongs to the caller's element; while it sits
/// on the free list, the first pointer-sized word of it is this link. This aliasing is the whole
/// trick of the pool - freed memory pays for its own bookkeeping.
#[derive(Debug)]
pub(crate) struct FreeSlot {
    /// The next free slot in the stack, if any.
    next: Option<NonNull<FreeSlot>>,
}

/// A memory pool for fixed-size objects.
///
/// `SlotPool` hands out uninitialized slots sized for one `T` each, in amortized O(1) time.
/// Storage is obtained from the heap one block of `GROW_SIZE` slots at a time, so element-grained
/// allocation traffic is reduced to one underlying allocation per `GROW_SIZE` elements. Freed
/// slots are kept on an intrusive free list (a stack threaded through the freed slots
/// themselves) and are reused in LIFO order before any fresh slot is touched.
///
/// The pool never constructs or destroys element values. A returned slot is raw capacity on loan
/// to the caller: initialize it, use it, drop the value in place, then return the slot via
/// [`deallocate()`](Self::deallocate). Slots still on loan when the pool is dropped are released
/// with the rest of the storage, without running any destructor.
///
/// # Growth
///
/// A new pool owns no storage at all. The first allocation, and every allocation that finds both
/// the free list empty and the newest block exhausted, obtains one more block of `GROW_SIZE`
/// slots. Blocks are never released individually - teardown releases them all at once.
///
/// # Example
///
/// ```
/// use slot_pool::SlotPool;
///
/// let mut pool = SlotPool::<u64, 4>::new();
///
/// let slot = pool.allocate().expect("allocation failed");
/// assert_eq!(pool.len(), 1);
/// assert_eq!(pool.capacity(), 4);
///
/// // The slot is uninitialized; write before reading.
/// // SAFETY: The slot is a valid, exclusively owned location for one u64.
/// unsafe { slot.as_ptr().write(42) };
///
/// // SAFETY: The slot came from this pool and u64 needs no destructor.
/// unsafe { pool.deallocate(slot) };
/// assert_eq!(pool.len(), 0);
/// ```
///
/// # Thread safety
///
/// The pool is thread-mobile ([`Send`] when `T` is) but not thread-safe ([`Sync`]): there is no
/// internal synchronization anywhere, and sharing one pool between threads requires external
/// mutual exclusion. It is also not [`Clone`] - duplicating the free-list head and block chain
/// would produce two pools handing out the same memory.
#[derive(Debug)]
pub struct SlotPool<T, const GROW_SIZE: usize = 1024> {
    /// Every block ever obtained, newest last. Dropping the vector releases all of them.
    blocks: Vec<Block<T, GROW_SIZE>>,

    /// Head of the free-slot stack. Every slot reachable from here is currently unused.
    free_head: Option<NonNull<FreeSlot>>,

    /// How many slots of the newest block have been handed out at least once. Starts at the
    /// "block full" sentinel `GROW_SIZE` so the first allocation triggers growth.
    used_in_newest: usize,

    /// Slots currently on loan: handed out and not yet returned. Used only by the accessors
    /// and debug checks, never by the allocation paths themselves.
    outstanding: usize,
}

impl<T, const GROW_SIZE: usize> SlotPool<T, GROW_SIZE> {
    /// Creates an empty pool.
    ///
    /// No storage is obtained until the first call to [`allocate()`](Self::allocate).
    ///
    /// # Example
    ///
    /// ```
    /// use slot_pool::SlotPool;
    ///
    /// let pool = SlotPool::<String>::new();
    /// assert!(pool.is_empty());
    /// assert_eq!(pool.capacity(), 0);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        const {
            assert!(GROW_SIZE > 0, "a pool block must contain at least one slot");
        }

        Self {
            blocks: Vec::new(),
            free_head: None,
            used_in_newest: GROW_SIZE,
            outstanding: 0,
        }
    }

    /// The number of slots currently on loan: handed out by [`allocate()`](Self::allocate) and
    /// not yet returned via [`deallocate()`](Self::deallocate).
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Can be mutated to infinitely growing memory use.
    #[inline]
    pub fn len(&self) -> usize {
        self.outstanding
    }

    /// Whether no slots are currently on loan.
    ///
    /// An empty pool may still be holding unused block storage.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.outstanding == 0
    }

    /// The total number of slots in all blocks obtained so far.
    ///
    /// Grows by exactly `GROW_SIZE` each time a fresh block is needed and never shrinks.
    ///
    /// # Example
    ///
    /// ```
    /// use slot_pool::SlotPool;
    ///
    /// let mut pool = SlotPool::<u32, 4>::new();
    /// assert_eq!(pool.capacity(), 0);
    ///
    /// let _slot = pool.allocate().expect("allocation failed");
    /// assert_eq!(pool.capacity(), 4);
    /// ```
    #[must_use]
    #[inline]
    pub fn capacity(&self) -> usize {
        // Overflow here would imply capacity is greater than virtual memory - impossible.
        self.blocks.len().wrapping_mul(GROW_SIZE)
    }

    /// Hands out one uninitialized slot sized and aligned for a `T`.
    ///
    /// Preference order: the most recently freed slot if the free list is non-empty, else the
    /// next untouched slot of the newest block, else slot 0 of a freshly obtained block. No two
    /// slots on loan at the same time ever overlap.
    ///
    /// The caller is responsible for initializing the slot before reading from it, for dropping
    /// whatever value it constructs there, and for eventually returning the slot via
    /// [`deallocate()`](Self::deallocate).
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`](crate::Error::OutOfMemory) if storage for a new block
    /// cannot be obtained. The pool is left in the state it had before the call.
    ///
    /// # Example
    ///
    /// ```
    /// use slot_pool::SlotPool;
    ///
    /// let mut pool = SlotPool::<u64, 4>::new();
    ///
    /// let first = pool.allocate().expect("allocation failed");
    /// let second = pool.allocate().expect("allocation failed");
    /// assert_ne!(first, second);
    ///
    /// // SAFETY: Both slots came from this pool and hold no constructed values.
    /// unsafe {
    ///     pool.deallocate(second);
    /// }
    /// // SAFETY: As above.
    /// unsafe {
    ///     pool.deallocate(first);
    /// }
    /// ```
    pub fn allocate(&mut self) -> Result<NonNull<T>> {
        if let Some(link) = self.free_head {
            // SAFETY: Every pointer on the free list was written as a FreeSlot by deallocate()
            // and has not been handed out since, so it is valid to read the link back.
            let next = unsafe { link.as_ptr().read().next };

            self.free_head = next;

            // Cannot overflow: bounded by the number of slots, which fit in virtual memory.
            self.outstanding = self.outstanding.wrapping_add(1);

            return Ok(link.cast::<T>());
        }

        if self.used_in_newest >= GROW_SIZE {
            // Obtain the block before touching any state, so a failure leaves us unchanged.
            let block = Block::new()?;

            self.blocks.push(block);
            self.used_in_newest = 0;
        }

        let block = self
            .blocks
            .last()
            .expect("a block exists: either the used counter says so or we just grew");

        let slot = block.slot_ptr(self.used_in_newest);

        // Cannot overflow: bounded by GROW_SIZE.
        self.used_in_newest = self.used_in_newest.wrapping_add(1);

        // Cannot overflow: bounded by the number of slots, which fit in virtual memory.
        self.outstanding = self.outstanding.wrapping_add(1);

        Ok(slot.cast::<T>())
    }

    /// Returns a slot to the pool, making it the next one [`allocate()`](Self::allocate) hands
    /// out.
    ///
    /// The slot's memory is reinterpreted as a free-list link; nothing outside the one slot is
    /// touched, and no destructor runs. O(1).
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// - The slot was returned by [`allocate()`](Self::allocate) on this same pool.
    /// - The slot has not already been deallocated since (no double-free).
    /// - Any value constructed in the slot has already been dropped in place.
    ///
    /// None of this is verified in release builds - this is a documented unchecked contract.
    /// Debug builds assert that the pointer lies on a slot boundary of storage owned by this
    /// pool.
    pub unsafe fn deallocate(&mut self, slot: NonNull<T>) {
        #[cfg(debug_assertions)]
        assert!(
            self.owns_slot(slot),
            "deallocate() received a pointer that this pool never handed out"
        );

        let link = slot.cast::<FreeSlot>();

        // SAFETY: The caller guarantees the slot came from this pool and holds no live value,
        // and every slot is sized and aligned for at least one FreeSlot link.
        unsafe {
            link.as_ptr().write(FreeSlot {
                next: self.free_head,
            });
        }

        self.free_head = Some(link);

        // Cannot wrap: the caller guarantees the slot was on loan, so outstanding is non-zero.
        self.outstanding = self.outstanding.wrapping_sub(1);
    }

    /// Whether the pointer lies on a slot boundary of a block owned by this pool, within the
    /// range of slots handed out at least once.
    #[cfg(debug_assertions)]
    #[allow(
        clippy::arithmetic_side_effects,
        reason = "debug-only membership check over addresses that exist by construction"
    )]
    fn owns_slot(&self, slot: NonNull<T>) -> bool {
        let slot_size = Block::<T, GROW_SIZE>::slot_layout().size();
        let addr = slot.addr().get();
        let newest = self.blocks.len().saturating_sub(1);

        self.blocks.iter().enumerate().any(|(index, block)| {
            let base = block.slot_ptr(0).addr().get();
            let handed_out = if index == newest {
                self.used_in_newest
            } else {
                GROW_SIZE
            };

            addr >= base
                && (addr - base) % slot_size == 0
                && (addr - base) / slot_size < handed_out
        })
    }
}

impl<T, const GROW_SIZE: usize> Default for SlotPool<T, GROW_SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: The raw pointers all target heap storage owned by this same pool, so moving the pool
// to another thread moves exclusive access to that storage along with it. That is sound as long
// as T itself may move between threads.
unsafe impl<T: Send, const GROW_SIZE: usize> Send for SlotPool<T, GROW_SIZE> {}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use std::fmt::Debug;
    use std::rc::Rc;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(SlotPool<u32>: Send, Debug, Default);
    assert_not_impl_any!(SlotPool<u32>: Sync, Clone);
    assert_not_impl_any!(SlotPool<Rc<u32>>: Send);

    #[test]
    fn new_pool_owns_no_storage() {
        let pool = SlotPool::<u64, 4>::new();

        assert!(pool.is_empty());
        assert_eq!(pool.len(), 0);
        assert_eq!(pool.capacity(), 0);
    }

    #[test]
    fn first_allocation_grows_by_one_block() {
        let mut pool = SlotPool::<u64, 4>::new();

        let slot = pool.allocate().expect("allocation failed");

        assert_eq!(pool.capacity(), 4);
        assert_eq!(pool.len(), 1);

        unsafe { pool.deallocate(slot) };
    }

    #[test]
    fn allocations_do_not_alias() {
        let mut pool = SlotPool::<u64, 4>::new();

        // Enough to span three blocks.
        let slots: Vec<_> = (0..10)
            .map(|_| pool.allocate().expect("allocation failed"))
            .collect();

        for (i, a) in slots.iter().enumerate() {
            for b in slots.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }

        for slot in slots {
            unsafe { pool.deallocate(slot) };
        }
    }

    #[test]
    fn freed_slot_is_reused_exactly() {
        let mut pool = SlotPool::<u64, 4>::new();

        let slot = pool.allocate().expect("allocation failed");
        unsafe { pool.deallocate(slot) };

        let reused = pool.allocate().expect("allocation failed");
        assert_eq!(reused, slot);

        unsafe { pool.deallocate(reused) };
    }

    #[test]
    fn reuse_order_is_lifo() {
        let mut pool = SlotPool::<u64, 4>::new();

        let a = pool.allocate().expect("allocation failed");
        let b = pool.allocate().expect("allocation failed");

        unsafe { pool.deallocate(a) };
        unsafe { pool.deallocate(b) };

        // b was freed last, so it comes back first.
        assert_eq!(pool.allocate().expect("allocation failed"), b);
        assert_eq!(pool.allocate().expect("allocation failed"), a);

        unsafe { pool.deallocate(a) };
        unsafe { pool.deallocate(b) };
    }

    #[test]
    fn free_list_is_preferred_over_untouched_slots() {
        let mut pool = SlotPool::<u64, 4>::new();

        let a = pool.allocate().expect("allocation failed");
        let _b = pool.allocate().expect("allocation failed");

        unsafe { pool.deallocate(a) };

        // Slot index 2 of the block is still untouched, but the freed slot wins.
        assert_eq!(pool.allocate().expect("allocation failed"), a);
    }

    #[test]
    fn growth_happens_exactly_at_the_block_boundary() {
        let mut pool = SlotPool::<u32, 4>::new();

        for _ in 0..4 {
            _ = pool.allocate().expect("allocation failed");
        }

        // Four allocations fit in one block.
        assert_eq!(pool.capacity(), 4);

        // The fifth needs a second block.
        _ = pool.allocate().expect("allocation failed");
        assert_eq!(pool.capacity(), 8);
    }

    #[test]
    fn deallocations_do_not_delay_growth_accounting() {
        let mut pool = SlotPool::<u32, 4>::new();

        // Fill the first block, then recycle one slot over and over. No growth.
        let mut slot = pool.allocate().expect("allocation failed");
        for _ in 0..3 {
            _ = pool.allocate().expect("allocation failed");
        }

        for _ in 0..16 {
            unsafe { pool.deallocate(slot) };
            slot = pool.allocate().expect("allocation failed");
        }

        assert_eq!(pool.capacity(), 4);
    }

    #[test]
    fn eight_allocations_span_exactly_two_blocks() {
        let mut pool = SlotPool::<u64, 4>::new();
        let stride = Block::<u64, 4>::slot_layout().size();

        let slots: Vec<_> = (0..8)
            .map(|_| pool.allocate().expect("allocation failed"))
            .collect();

        assert_eq!(pool.capacity(), 8);

        // Slots 0-3 are consecutive within block A, 4-7 within block B.
        for window in [&slots[0..4], &slots[4..8]] {
            let base = window[0].addr().get();
            for (index, slot) in window.iter().enumerate() {
                assert_eq!(slot.addr().get(), base + index * stride);
            }
        }

        // Returning slot 2 makes its exact memory the next thing handed out.
        let third = slots[2];
        unsafe { pool.deallocate(third) };

        assert_eq!(pool.allocate().expect("allocation failed"), third);
    }

    #[test]
    fn teardown_with_slots_still_on_loan() {
        let mut pool = SlotPool::<u64, 4>::new();

        // Span multiple blocks and return only some of the slots. Dropping the pool must
        // release every block regardless. (Miri verifies the storage accounting.)
        let slots: Vec<_> = (0..10)
            .map(|_| pool.allocate().expect("allocation failed"))
            .collect();

        for slot in slots.iter().step_by(2) {
            unsafe { pool.deallocate(*slot) };
        }

        drop(pool);
    }

    #[test]
    fn slot_fits_element_larger_than_a_link() {
        let mut pool = SlotPool::<[u64; 4], 2>::new();

        let slot = pool.allocate().expect("allocation failed");

        unsafe { slot.as_ptr().write([1, 2, 3, 4]) };
        unsafe {
            assert_eq!(slot.as_ptr().read(), [1, 2, 3, 4]);
        }

        unsafe { pool.deallocate(slot) };
    }

    #[test]
    fn slot_fits_element_smaller_than_a_link() {
        let mut pool = SlotPool::<u8, 4>::new();

        let a = pool.allocate().expect("allocation failed");
        let b = pool.allocate().expect("allocation failed");

        unsafe { a.as_ptr().write(7) };
        unsafe { b.as_ptr().write(9) };
        unsafe {
            assert_eq!(a.as_ptr().read(), 7);
            assert_eq!(b.as_ptr().read(), 9);
        }

        unsafe { pool.deallocate(b) };
        unsafe { pool.deallocate(a) };

        // The link overwrite on deallocate must not have bled into the other slot.
        assert_eq!(pool.allocate().expect("allocation failed"), a);
        assert_eq!(pool.allocate().expect("allocation failed"), b);
    }

    #[test]
    fn values_survive_in_slots_across_other_operations() {
        let mut pool = SlotPool::<String, 2>::new();

        let a = pool.allocate().expect("allocation failed");
        unsafe { a.as_ptr().write(String::from("first")) };

        // Churn the pool: grow a second block, free and reuse slots around `a`.
        let b = pool.allocate().expect("allocation failed");
        let c = pool.allocate().expect("allocation failed");
        unsafe { pool.deallocate(b) };
        let d = pool.allocate().expect("allocation failed");
        assert_eq!(d, b);

        unsafe {
            assert_eq!(*a.as_ptr(), "first");
        }

        unsafe { a.as_ptr().drop_in_place() };
        unsafe { pool.deallocate(a) };
        unsafe { pool.deallocate(c) };
        unsafe { pool.deallocate(d) };
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic]
    fn foreign_pointer_is_caught_in_debug_builds() {
        let mut pool = SlotPool::<u64, 4>::new();
        let _slot = pool.allocate().expect("allocation failed");

        let mut foreign = 0_u64;
        let foreign = NonNull::from(&mut foreign);

        unsafe { pool.deallocate(foreign) };
    }
}
