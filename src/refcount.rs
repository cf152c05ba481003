//! Per-slot reference counts.
//!
//! A count starts at one for the creator of a handle. `get` adds a holder,
//! `put` drops one and reports whether the count has reached zero or gone
//! below it. Going negative is not an error: it happens when more releases
//! race a reclaim than there are holders, and the table settles it under
//! its exclusive lock.

use core::sync::atomic::{
    AtomicI32,
    Ordering::{AcqRel, Acquire, Relaxed},
};

#[derive(Debug)]
pub(crate) struct SlotCount {
    count: AtomicI32,
}

impl SlotCount {
    pub(crate) fn new(initial: i32) -> Self {
        Self {
            count: AtomicI32::new(initial),
        }
    }

    /// Add one holder.
    #[inline]
    pub(crate) fn get(&self) {
        // Holders already keep the slot alive, so the increment needs no
        // ordering of its own.
        let prev = self.count.fetch_add(1, Relaxed);
        if prev == i32::MAX {
            // Follow Rc semantics: abort on overflow rather than continue unsafely.
            std::process::abort();
        }
    }

    /// Drop one holder. Returns true if the count is now zero or below.
    #[inline]
    pub(crate) fn put(&self) -> bool {
        self.count.fetch_sub(1, AcqRel) <= 1
    }

    /// Whether some holder still keeps the slot alive.
    #[inline]
    pub(crate) fn is_live(&self) -> bool {
        self.count.load(Acquire) > 0
    }

    #[cfg(test)]
    pub(crate) fn load(&self) -> i32 {
        self.count.load(Acquire)
    }
}
