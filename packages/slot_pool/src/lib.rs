//! A memory pool for fixed-size objects, with an allocator adapter for node-based containers.
//!
//! This crate provides [`SlotPool`], a growing pool that hands out uninitialized slots sized for
//! one element each, and [`PoolAllocator`], the thin allocator-shaped interface containers expect
//! on top of it. Storage is obtained from the heap one block of `GROW_SIZE` slots at a time;
//! returned slots are kept on an intrusive free list and reused in LIFO order, so the steady
//! state performs no underlying allocation at all.
//!
//! # Key Features
//!
//! - **Amortized O(1) allocation**: One underlying heap request per `GROW_SIZE` elements
//! - **O(1) deallocation**: Freed slots become free-list links in their own storage
//! - **Zero per-slot overhead**: No headers, no occupancy bitmap; free slots pay for their own
//!   bookkeeping
//! - **LIFO reuse**: The most recently freed slot is the next one handed out, which keeps hot
//!   memory hot
//! - **Separated allocation and construction**: Slots are raw capacity; value lifetimes are the
//!   caller's (or the adapter's) to manage
//! - **Compile-time growth factor**: `GROW_SIZE` is a const parameter, defaulting to 1024
//! - **Thread mobility**: A pool can move between threads but is not shared without external
//!   synchronization
//!
//! # Examples
//!
//! ## Raw slots from the pool
//!
//! ```rust
//! use slot_pool::SlotPool;
//!
//! let mut pool = SlotPool::<u64>::new();
//!
//! let slot = pool.allocate().expect("allocation failed");
//!
//! // SAFETY: The slot is a valid, exclusively owned location for one u64.
//! unsafe { slot.as_ptr().write(42) };
//!
//! // SAFETY: The slot holds the value written above.
//! unsafe {
//!     assert_eq!(slot.as_ptr().read(), 42);
//! }
//!
//! // SAFETY: The slot came from this pool and u64 needs no destructor.
//! unsafe { pool.deallocate(slot) };
//! ```
//!
//! ## Managed values through the adapter
//!
//! ```rust
//! use slot_pool::PoolAllocator;
//!
//! let mut alloc = PoolAllocator::<String>::new();
//!
//! let slot = alloc.allocate(1, None).expect("allocation failed");
//!
//! // SAFETY: The slot is a fresh, uninitialized allocation from this allocator.
//! unsafe { alloc.construct(slot, String::from("pooled")) };
//!
//! // SAFETY: The slot holds the value constructed above.
//! unsafe {
//!     assert_eq!(*slot.as_ptr(), "pooled");
//! }
//!
//! // SAFETY: The value is initialized and dropped exactly once here.
//! unsafe { alloc.destroy(slot) };
//!
//! // SAFETY: The slot came from this allocator and its value has been destroyed.
//! unsafe { alloc.deallocate(slot, 1) };
//! ```

mod allocator;
mod block;
mod error;
mod pool;

pub use allocator::*;
pub(crate) use block::*;
pub use error::*;
pub use pool::SlotPool;
pub(crate) use pool::FreeSlot;
