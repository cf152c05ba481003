//! HandleMap: the concurrent table, with reference-counted resolution and
//! two-phase release on top of the slot arena.

use crate::rwlock::SpinRwLock;
use crate::slots::{AllocationError, Handle, Slots, DEFAULT_CAPACITY};
use core::fmt;
use tracing::{debug, trace, warn};

/// A table of small integer handles shared between threads.
///
/// `insert` stores a payload and returns its handle with one reference held
/// by the caller. `grab` resolves a handle and takes another reference;
/// `release` gives one back. The release that drops the last reference
/// removes the entry and returns the payload; every other call returns
/// `None`.
///
/// A release that drives the count to zero can still come back empty: if
/// another thread grabs the handle before the entry is unlinked, the entry
/// survives and that thread now owns the last reference.
///
/// ```
/// use rc_handlemap::HandleMap;
///
/// let map = HandleMap::new();
/// let h = map.insert("payload").unwrap();
/// assert_eq!(map.grab(h), Some("payload"));
/// assert_eq!(map.release(h), None);
/// assert_eq!(map.release(h), Some("payload"));
/// assert_eq!(map.grab(h), None);
/// ```
pub struct HandleMap<T> {
    slots: SpinRwLock<Slots<T>>,
}

impl<T> HandleMap<T> {
    /// Create a table with [`DEFAULT_CAPACITY`] slots.
    pub fn new() -> Self {
        Self::from_slots(Slots::with_capacity(DEFAULT_CAPACITY))
    }

    /// Create a table with [`DEFAULT_CAPACITY`] slots, reporting allocation
    /// failure instead of aborting.
    pub fn try_new() -> Result<Self, AllocationError> {
        Self::try_with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a table with room for at least `capacity` slots. The size is
    /// rounded up to a power of two.
    pub fn try_with_capacity(capacity: usize) -> Result<Self, AllocationError> {
        match Slots::try_with_capacity(capacity) {
            Ok(slots) => Ok(Self::from_slots(slots)),
            Err(e) => {
                warn!(capacity = e.capacity(), "cannot allocate handle table");
                Err(e)
            }
        }
    }

    fn from_slots(slots: Slots<T>) -> Self {
        Self {
            slots: SpinRwLock::new(slots),
        }
    }

    /// Store `payload` and return a fresh nonzero handle for it.
    pub fn insert(&self, payload: T) -> Result<Handle, AllocationError> {
        // Events are emitted after the guard is gone; a subscriber must never
        // run inside the critical section.
        let (inserted, from, to) = {
            let mut slots = self.slots.write();
            let from = slots.capacity();
            let inserted = slots.insert(payload);
            (inserted, from, slots.capacity())
        };
        match inserted {
            Ok(handle) => {
                if to != from {
                    debug!(from, to, "grew handle table");
                }
                Ok(handle)
            }
            Err(e) => {
                warn!(capacity = e.capacity(), "cannot grow handle table");
                Err(e)
            }
        }
    }

    /// Give back one reference to `handle`. Returns the payload if this call
    /// removed the entry.
    pub fn release(&self, handle: Handle) -> Option<T> {
        if self.release_ref(handle) {
            self.try_reclaim(handle)
        } else {
            None
        }
    }

    // Shared phase: true if the count reached zero or below.
    fn release_ref(&self, handle: Handle) -> bool {
        let slots = self.slots.read();
        slots
            .get(handle)
            .is_some_and(|entry| entry.refcount().put())
    }

    // Exclusive phase: unlink unless someone grabbed the handle in between.
    fn try_reclaim(&self, handle: Handle) -> Option<T> {
        let mut slots = self.slots.write();
        if slots.get(handle)?.refcount().is_live() {
            drop(slots);
            trace!(%handle, "reclaim aborted, handle was grabbed again");
            return None;
        }
        let payload = slots.remove(handle);
        drop(slots);
        trace!(%handle, "reclaimed handle");
        payload
    }

    /// Copy up to `out.len()` live handles into `out` and return how many
    /// are live in total. A return larger than `out.len()` means the
    /// listing was truncated.
    pub fn list(&self, out: &mut [Handle]) -> usize {
        let slots = self.slots.read();
        for (dst, entry) in out.iter_mut().zip(slots.iter()) {
            *dst = entry.handle();
        }
        slots.len()
    }

    /// Snapshot of every live handle.
    pub fn handles(&self) -> Vec<Handle> {
        self.slots.read().iter().map(|e| e.handle()).collect()
    }

    /// Whether `handle` is live right now. Other threads may change that
    /// as soon as this returns.
    pub fn contains(&self, handle: Handle) -> bool {
        self.slots.read().get(handle).is_some()
    }

    /// Number of live handles at the moment of the call.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Whether the table held no live handles at the moment of the call.
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Current number of slots. Grows on insert and never shrinks.
    pub fn capacity(&self) -> usize {
        self.slots.read().capacity()
    }

    /// Tear the table down, handing back the payloads of entries that were
    /// never fully released.
    pub fn into_remaining(self) -> Vec<(Handle, T)> {
        self.slots.into_inner().into_live()
    }
}

impl<T: Clone> HandleMap<T> {
    /// Resolve `handle` and take a reference to it. Each successful grab
    /// must be matched by a `release`.
    pub fn grab(&self, handle: Handle) -> Option<T> {
        let slots = self.slots.read();
        let entry = slots.get(handle)?;
        // Clone before counting so a panicking clone leaves the count alone.
        let payload = entry.payload().clone();
        entry.refcount().get();
        Some(payload)
    }
}

impl<T> Default for HandleMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for HandleMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.read();
        f.debug_struct("HandleMap")
            .field("len", &slots.len())
            .field("capacity", &slots.capacity())
            .finish_non_exhaustive()
    }
}
