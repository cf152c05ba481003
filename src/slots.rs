//! Slots: structural layer with handle placement, id issuance and growth.
//!
//! A handle's slot is `id & (capacity - 1)`, so the id itself is the probe
//! key: issuing a handle advances the id counter until it lands on a free
//! slot. Capacity is a power of two and doubles before occupancy reaches
//! three quarters of it, which keeps a free slot within reach of the probe.
//!
//! Growth rehomes each live slot at `id & (2 * capacity - 1)`. Live ids are
//! unique and the new mask has one more bit, so rehoming never collides.
//!
//! This layer has no locking; every mutation goes through `&mut self`. It
//! does not log either: callers hold the table lock while in here, so they
//! report outcomes once the lock is released.

use crate::refcount::SlotCount;
use core::fmt;

/// Initial number of slots in a table.
pub const DEFAULT_CAPACITY: usize = 16;

/// Upper bound on table capacity. Every index below it is reachable by
/// masking a `u32` id.
pub const MAX_CAPACITY: usize = 1 << 31;

const MIN_CAPACITY: usize = 2;

/// Opaque handle issued by a `HandleMap`.
///
/// A plain `u32` underneath, so it can be stored or passed around as an
/// integer. Zero is reserved and never names a live entry.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Handle(u32);

impl Handle {
    /// The reserved handle. Never resolves.
    pub const INVALID: Handle = Handle(0);

    pub const fn from_raw(raw: u32) -> Self {
        Handle(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    #[inline]
    fn index(self, mask: usize) -> usize {
        self.0 as usize & mask
    }
}

impl From<u32> for Handle {
    fn from(raw: u32) -> Self {
        Handle(raw)
    }
}

impl From<Handle> for u32 {
    fn from(h: Handle) -> Self {
        h.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The table could not obtain memory for its slot array, or the requested
/// size is beyond [`MAX_CAPACITY`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("cannot allocate a handle table of {capacity} slots")]
pub struct AllocationError {
    capacity: usize,
}

impl AllocationError {
    /// Number of slots that was requested.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[derive(Debug)]
pub(crate) struct Entry<T> {
    id: u32,
    refcount: SlotCount,
    payload: T,
}

impl<T> Entry<T> {
    pub(crate) fn handle(&self) -> Handle {
        Handle(self.id)
    }

    pub(crate) fn refcount(&self) -> &SlotCount {
        &self.refcount
    }

    pub(crate) fn payload(&self) -> &T {
        &self.payload
    }
}

#[derive(Debug)]
pub(crate) enum Slot<T> {
    Vacant,
    Occupied(Entry<T>),
}

impl<T> Slot<T> {
    fn is_vacant(&self) -> bool {
        matches!(self, Slot::Vacant)
    }
}

pub(crate) struct Slots<T> {
    slots: Box<[Slot<T>]>,
    occupied: usize,
    last_id: u32,
    max_capacity: usize,
}

impl<T> Slots<T> {
    /// Allocate `capacity` slots, aborting on OOM like any std collection.
    /// `capacity` must already be a valid table size.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two() && capacity <= MAX_CAPACITY);
        Self::from_slots((0..capacity).map(|_| Slot::Vacant).collect())
    }

    /// Allocate room for at least `requested` slots, rounded up to a power
    /// of two.
    pub(crate) fn try_with_capacity(requested: usize) -> Result<Self, AllocationError> {
        let capacity = normalize_capacity(requested)?;
        Ok(Self::from_slots(try_vacant_slots(capacity)?))
    }

    fn from_slots(slots: Box<[Slot<T>]>) -> Self {
        Self {
            slots,
            occupied: 0,
            last_id: 0,
            max_capacity: MAX_CAPACITY,
        }
    }

    /// Lower the growth ceiling so tests can reach it.
    #[cfg(test)]
    pub(crate) fn with_max_capacity(mut self, max_capacity: usize) -> Self {
        debug_assert!(max_capacity >= self.capacity());
        self.max_capacity = max_capacity;
        self
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.occupied
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    #[inline]
    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    /// Resolve a handle to its live entry.
    pub(crate) fn get(&self, handle: Handle) -> Option<&Entry<T>> {
        if !handle.is_valid() {
            return None;
        }
        match &self.slots[handle.index(self.mask())] {
            Slot::Occupied(e) if e.id == handle.0 => Some(e),
            _ => None,
        }
    }

    /// Store `payload` under a fresh handle with a count of one, growing
    /// first if the new entry would reach the load limit.
    pub(crate) fn insert(&mut self, payload: T) -> Result<Handle, AllocationError> {
        if self.occupied + 1 >= self.capacity() / 4 * 3 {
            self.grow()?;
        }
        let mask = self.mask();
        loop {
            let handle = Handle(self.next_id());
            let slot = &mut self.slots[handle.index(mask)];
            if !slot.is_vacant() {
                continue;
            }
            *slot = Slot::Occupied(Entry {
                id: handle.0,
                refcount: SlotCount::new(1),
                payload,
            });
            self.occupied += 1;
            return Ok(handle);
        }
    }

    // Zero is reserved, so the counter skips it when it wraps.
    fn next_id(&mut self) -> u32 {
        self.last_id = self.last_id.wrapping_add(1);
        if self.last_id == 0 {
            self.last_id = 1;
        }
        self.last_id
    }

    /// Double the slot array. On failure the current array is untouched.
    pub(crate) fn grow(&mut self) -> Result<(), AllocationError> {
        let from = self.capacity();
        let to = from * 2;
        if to > self.max_capacity {
            return Err(AllocationError { capacity: to });
        }
        let grown = try_vacant_slots(to)?;
        let old = core::mem::replace(&mut self.slots, grown);
        let mask = self.mask();
        for slot in Vec::from(old) {
            if let Slot::Occupied(e) = slot {
                let i = e.handle().index(mask);
                debug_assert!(self.slots[i].is_vacant(), "rehoming collided");
                self.slots[i] = Slot::Occupied(e);
            }
        }
        Ok(())
    }

    /// Unlink a live entry and hand back its payload, whatever its count.
    pub(crate) fn remove(&mut self, handle: Handle) -> Option<T> {
        self.get(handle)?;
        let i = handle.index(self.mask());
        match core::mem::replace(&mut self.slots[i], Slot::Vacant) {
            Slot::Occupied(e) => {
                self.occupied -= 1;
                Some(e.payload)
            }
            Slot::Vacant => None,
        }
    }

    /// Live entries in slot order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Entry<T>> {
        self.slots.iter().filter_map(|s| match s {
            Slot::Occupied(e) => Some(e),
            Slot::Vacant => None,
        })
    }

    /// Consume the arena, yielding every payload still held by a live slot.
    pub(crate) fn into_live(self) -> Vec<(Handle, T)> {
        Vec::from(self.slots)
            .into_iter()
            .filter_map(|s| match s {
                Slot::Occupied(e) => Some((Handle(e.id), e.payload)),
                Slot::Vacant => None,
            })
            .collect()
    }
}

fn normalize_capacity(requested: usize) -> Result<usize, AllocationError> {
    requested
        .max(MIN_CAPACITY)
        .checked_next_power_of_two()
        .filter(|&c| c <= MAX_CAPACITY)
        .ok_or(AllocationError {
            capacity: requested,
        })
}

fn try_vacant_slots<T>(capacity: usize) -> Result<Box<[Slot<T>]>, AllocationError> {
    let mut slots = Vec::new();
    if slots.try_reserve_exact(capacity).is_err() {
        return Err(AllocationError { capacity });
    }
    slots.resize_with(capacity, || Slot::Vacant);
    Ok(slots.into_boxed_slice())
}
