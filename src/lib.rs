//! rc-handlemap: a concurrent table that hands out small integer handles for
//! caller objects, with reference-counted resolution and reclamation.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: let many threads resolve a handle while another thread may be
//!   deleting it, without ever resolving to a removed or wrong payload and
//!   without a garbage collector.
//! - Layers:
//!   - SpinRwLock<T>: spin-based reader-writer lock. Shared mode for
//!     lookups, exclusive mode for structural changes. No fairness.
//!   - Slots<T>: power-of-two slot arena. A handle lives at
//!     `id & (capacity - 1)`; issuing a handle advances the id until it
//!     lands on a free slot. Not thread-safe on its own.
//!   - HandleMap<T>: public API. One SpinRwLock around the arena plus an
//!     atomic count per slot; `insert`, `grab`, `release`, `list`.
//!
//! Constraints
//! - Handles are `u32`; zero is reserved and never resolves.
//! - Capacity is a power of two, doubles before occupancy reaches 3/4 of
//!   it, and never shrinks.
//! - At most one live slot holds a given id.
//! - The payload of an entry is handed back by exactly one `release`.
//!
//! Release protocol
//! - Phase one runs under the shared lock: validate the handle and
//!   decrement its count. If the count is still positive, done.
//! - Phase two runs under the exclusive lock: validate again and re-check
//!   the count. A `grab` that slipped in between the phases has pushed it
//!   back above zero; the entry survives and the grabber now owns the last
//!   reference. Otherwise the slot is cleared and the payload returned.
//! - Consequence for callers: seeing your release drive the count to zero
//!   does not mean you get the payload.
//!
//! Why this split?
//! - The only unsafe code is the lock's `UnsafeCell`; the arena and the
//!   table are safe Rust on top of its guards.
//! - Counts are atomics so resolution and the common release path only
//!   need the shared lock.
//!
//! Reentrancy policy
//! - The table calls user code under its lock in one place: `T::clone`
//!   inside `grab`. Re-entering the same table from there would spin
//!   forever; debug builds detect it and panic instead.
//!
//! Notes and non-goals
//! - The table never disposes of a payload itself: the reclaiming release
//!   returns it by value, and `HandleMap::into_remaining` hands back what
//!   is left at teardown. A plain drop of the table drops leftovers like
//!   any collection would.
//! - No persistence or serialization.
//! - Writers can starve under sustained read traffic.

mod handle_map;
mod refcount;
mod reentrancy;
pub mod rwlock;
mod slots;
mod slots_proptest;

// Public surface
pub use handle_map::HandleMap;
pub use rwlock::SpinRwLock;
pub use slots::{AllocationError, Handle, DEFAULT_CAPACITY, MAX_CAPACITY};
