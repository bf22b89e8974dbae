//! Usage example for `PoolAllocator`.
//!
//! This example demonstrates the allocator-shaped interface on top of the pool: single-element
//! allocation, separate in-place construction and destruction, rejection of requests the pool
//! cannot express, and rebinding to a related element type.

use slot_pool::{Error, PoolAllocator};

fn main() {
    let mut alloc = PoolAllocator::<String, 64>::new();

    // Acquire a slot, then construct a value in it as a separate step.
    let slot = alloc.allocate(1, None).expect("allocation failed");

    // SAFETY: The slot is a fresh, uninitialized allocation from this allocator.
    unsafe { alloc.construct(slot, String::from("node payload")) };

    // SAFETY: The slot holds the value constructed above.
    unsafe {
        println!("Constructed value: {}", *slot.as_ptr());
    }

    // The pool has no notion of contiguous runs or placement, so these are rejected.
    assert!(matches!(
        alloc.allocate(3, None),
        Err(Error::UnsupportedRequest)
    ));
    assert!(matches!(
        alloc.allocate(1, Some(slot)),
        Err(Error::UnsupportedRequest)
    ));
    println!("Multi-element and hinted requests are rejected as unsupported");

    // Destruction and slot release are separate steps, mirroring acquisition.
    // SAFETY: The value is initialized and dropped exactly once here.
    unsafe { alloc.destroy(slot) };
    // SAFETY: The slot came from this allocator and its value has been destroyed.
    unsafe { alloc.deallocate(slot, 1) };

    println!("Allocator is empty again: {}", alloc.is_empty());

    // Rebinding produces the analogous allocator for another element type, with its own pool.
    let mut weight_alloc = alloc.rebind::<f64>();

    let weight = weight_alloc.allocate(1, None).expect("allocation failed");
    // SAFETY: The slot is a fresh, uninitialized allocation from this allocator.
    unsafe { weight_alloc.construct(weight, 0.75) };
    // SAFETY: The slot holds the value constructed above.
    unsafe {
        println!("Rebound allocator holds: {}", *weight.as_ptr());
    }
    // SAFETY: The value needs no destructor and the slot came from this allocator.
    unsafe { weight_alloc.deallocate(weight, 1) };

    println!("PoolAllocator example completed successfully!");
}
