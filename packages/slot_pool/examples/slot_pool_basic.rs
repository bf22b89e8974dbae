//! Basic usage example for `SlotPool`.
//!
//! This example demonstrates allocating raw slots from the pool, block-at-a-time capacity
//! growth, and LIFO reuse of freed slots.

use slot_pool::SlotPool;

fn main() {
    // A small growth factor so the output shows growth happening.
    let mut pool = SlotPool::<u64, 4>::new();

    println!("Created SlotPool with capacity: {}", pool.capacity());

    // Take a few slots. The first allocation obtains the first block.
    let slot1 = pool.allocate().expect("allocation failed");
    let slot2 = pool.allocate().expect("allocation failed");
    let slot3 = pool.allocate().expect("allocation failed");

    println!(
        "Allocated 3 slots. Pool has {} slots on loan with capacity {}",
        pool.len(),
        pool.capacity()
    );

    // Slots are uninitialized; write before reading.
    // SAFETY: Each slot is a valid, exclusively owned location for one u64.
    unsafe {
        slot1.as_ptr().write(0xdead_beef);
        slot2.as_ptr().write(0xcafe_babe);
        slot3.as_ptr().write(0xfeed_face);
    }

    // SAFETY: The slots hold the values written above.
    unsafe {
        println!("Slot 1: {:#x}", slot1.as_ptr().read());
        println!("Slot 2: {:#x}", slot2.as_ptr().read());
        println!("Slot 3: {:#x}", slot3.as_ptr().read());
    }

    // Return the middle slot. Its memory becomes the next slot handed out.
    // SAFETY: The slot came from this pool and u64 needs no destructor.
    unsafe { pool.deallocate(slot2) };

    let reused = pool.allocate().expect("allocation failed");
    assert_eq!(reused, slot2);
    println!("Freed slot was reused at the same address: {reused:p}");

    // Keep allocating past the block boundary and watch capacity grow by whole blocks.
    let mut slots = vec![slot1, slot3, reused];
    for _ in 0..9 {
        slots.push(pool.allocate().expect("allocation failed"));
    }

    println!(
        "Pool now has {} slots on loan with capacity {}",
        pool.len(),
        pool.capacity()
    );

    for slot in slots {
        // SAFETY: Every slot came from this pool, exactly once, and u64 needs no destructor.
        unsafe { pool.deallocate(slot) };
    }

    println!("All storage is released when the pool is dropped");
    println!("SlotPool example completed successfully!");
}
