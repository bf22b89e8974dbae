use std::alloc::{Layout, alloc, dealloc};
use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::{Error, FreeSlot, Result};

/// One contiguous run of `GROW_SIZE` slots, obtained as a single storage request.
///
/// A block exclusively owns its raw storage region and releases it when dropped. It does not
/// know, and never tracks, which of its slots are currently handed out - occupancy bookkeeping
/// is entirely the pool's concern. Each slot is large and aligned enough to hold either one `T`
/// or one [`FreeSlot`] link, whichever is bigger.
#[derive(Debug)]
pub(crate) struct Block<T, const GROW_SIZE: usize> {
    /// Base of the raw storage region holding all `GROW_SIZE` slots.
    storage: NonNull<u8>,

    _element: PhantomData<T>,
}

impl<T, const GROW_SIZE: usize> Block<T, GROW_SIZE> {
    /// The layout of one slot: sized for the larger of `T` and a free-list link, aligned for
    /// the stricter of the two, and padded so slots can be laid out as an array.
    #[must_use]
    pub(crate) fn slot_layout() -> Layout {
        let size = size_of::<T>().max(size_of::<FreeSlot>());
        let align = align_of::<T>().max(align_of::<FreeSlot>());

        Layout::from_size_align(size, align)
            .expect("slot layout is derived from existing type layouts, so it must be valid")
            .pad_to_align()
    }

    /// The layout of the whole storage region: `GROW_SIZE` slots, back to back.
    #[must_use]
    fn storage_layout() -> Layout {
        let slot_layout = Self::slot_layout();

        let total_size = slot_layout
            .size()
            .checked_mul(GROW_SIZE)
            .expect("total block size cannot overflow for any growth factor that fits in memory");

        Layout::from_size_align(total_size, slot_layout.align())
            .expect("block layout is a simple array of slot layouts, so it must be valid")
    }

    /// Obtains storage for a new block of `GROW_SIZE` slots.
    ///
    /// The slots start uninitialized. If the underlying allocator cannot satisfy the request,
    /// returns [`Error::OutOfMemory`] without any other effect.
    pub(crate) fn new() -> Result<Self> {
        let layout = Self::storage_layout();

        // SAFETY: The layout is never zero-sized - a slot is at least one free-list link and
        // GROW_SIZE is non-zero (asserted at pool construction).
        let allocation = unsafe { alloc(layout) };

        let Some(storage) = NonNull::new(allocation) else {
            return Err(Error::OutOfMemory);
        };

        Ok(Self {
            storage,
            _element: PhantomData,
        })
    }

    /// Returns a pointer to the slot at the given index.
    ///
    /// The slot contents are whatever the pool last made of them - this is pure address
    /// arithmetic over the block's own storage.
    ///
    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    #[must_use]
    pub(crate) fn slot_ptr(&self, index: usize) -> NonNull<u8> {
        assert!(
            index < GROW_SIZE,
            "slot index {index} out of bounds in a block of {GROW_SIZE} slots"
        );

        // Cannot overflow because that would imply the block extends beyond virtual memory.
        let offset = index.wrapping_mul(Self::slot_layout().size());

        // SAFETY: Guarded by the bounds check above - the offset stays within the storage
        // region allocated in `new()`.
        unsafe { self.storage.byte_add(offset) }
    }
}

impl<T, const GROW_SIZE: usize> Drop for Block<T, GROW_SIZE> {
    fn drop(&mut self) {
        // SAFETY: The layout must match between alloc and dealloc. It does - both come from
        // `storage_layout()`, which depends only on `T` and `GROW_SIZE`.
        unsafe {
            dealloc(self.storage.as_ptr(), Self::storage_layout());
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::arithmetic_side_effects,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use super::*;

    #[test]
    fn slot_layout_fits_element_and_link() {
        let layout = Block::<u64, 4>::slot_layout();

        assert!(layout.size() >= size_of::<u64>());
        assert!(layout.size() >= size_of::<FreeSlot>());
        assert!(layout.align() >= align_of::<u64>());
        assert!(layout.align() >= align_of::<FreeSlot>());
    }

    #[test]
    fn slot_layout_is_link_sized_for_small_elements() {
        // A u8 element does not shrink the slot below one free-list link.
        let layout = Block::<u8, 4>::slot_layout();

        assert_eq!(layout.size(), size_of::<FreeSlot>());
    }

    #[test]
    fn slot_layout_stride_is_aligned() {
        #[repr(C, align(16))]
        struct Wide {
            data: [u64; 3],
        }

        let layout = Block::<Wide, 4>::slot_layout();

        assert_eq!(layout.size() % layout.align(), 0);
        assert!(layout.align() >= 16);
    }

    #[test]
    fn slots_are_distinct_and_aligned() {
        let block = Block::<u64, 8>::new().expect("block allocation failed");
        let stride = Block::<u64, 8>::slot_layout().size();

        let base = block.slot_ptr(0).addr().get();

        for index in 0..8 {
            let slot = block.slot_ptr(index);
            assert_eq!(slot.addr().get(), base + index * stride);
            assert_eq!(slot.addr().get() % Block::<u64, 8>::slot_layout().align(), 0);
        }
    }

    #[test]
    #[should_panic]
    fn out_of_bounds_slot_panics() {
        let block = Block::<u64, 4>::new().expect("block allocation failed");

        _ = block.slot_ptr(4);
    }
}
