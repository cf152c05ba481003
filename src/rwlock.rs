//! Spin-based reader-writer lock.
//!
//! Two atomics carry the whole state: a `write` flag claimed by
//! test-and-set, and a count of live readers. A writer sets the flag and
//! then waits for the readers to drain. A reader bumps the count and then
//! re-checks the flag; if a writer got in first the reader backs out and
//! retries.
//!
//! There is no queueing and no fairness: steady reader traffic can keep a
//! writer waiting indefinitely. All waiting is a busy loop, so critical
//! sections must stay short.
//!
//! The reader's "increment, then load flag" and the writer's "set flag, then
//! load count" are a store-load handshake; both sides use `SeqCst` so at
//! least one of them observes the other. Unlocks are `Release`, acquisitions
//! synchronize with them through the `SeqCst` loads.

use crate::reentrancy::{self, ReentrancyGuard};
use core::cell::UnsafeCell;
use core::fmt;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{
    AtomicBool, AtomicU32,
    Ordering::{Relaxed, Release, SeqCst},
};

pub struct SpinRwLock<T: ?Sized> {
    write: AtomicBool,
    readers: AtomicU32,
    value: UnsafeCell<T>,
}

// Readers hand out `&T` on several threads at once, so sharing needs `T: Sync`.
unsafe impl<T: ?Sized + Send + Sync> Sync for SpinRwLock<T> {}

impl<T> SpinRwLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            write: AtomicBool::new(false),
            readers: AtomicU32::new(0),
            value: UnsafeCell::new(value),
        }
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: ?Sized> SpinRwLock<T> {
    /// Acquire in shared mode. The guard releases on drop.
    pub fn read(&self) -> ReadGuard<'_, T> {
        let reentry = reentrancy::enter(self);
        loop {
            while self.write.load(Relaxed) {
                core::hint::spin_loop();
            }
            self.readers.fetch_add(1, SeqCst);
            if !self.write.load(SeqCst) {
                return ReadGuard {
                    lock: self,
                    _reentry: reentry,
                };
            }
            // A writer claimed the flag between our check and increment.
            self.readers.fetch_sub(1, Release);
        }
    }

    /// Acquire in exclusive mode. The guard releases on drop.
    pub fn write(&self) -> WriteGuard<'_, T> {
        let reentry = reentrancy::enter(self);
        while self.write.swap(true, SeqCst) {
            core::hint::spin_loop();
        }
        while self.readers.load(SeqCst) != 0 {
            core::hint::spin_loop();
        }
        WriteGuard {
            lock: self,
            _reentry: reentry,
        }
    }

    /// Exclusive access without locking; `&mut self` already proves it.
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }
}

impl<T: Default> Default for SpinRwLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized> fmt::Debug for SpinRwLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpinRwLock")
            .field("write", &self.write.load(Relaxed))
            .field("readers", &self.readers.load(Relaxed))
            .finish_non_exhaustive()
    }
}

/// Shared access returned by [`SpinRwLock::read`].
pub struct ReadGuard<'a, T: ?Sized> {
    lock: &'a SpinRwLock<T>,
    _reentry: ReentrancyGuard<'a>,
}

impl<T: ?Sized> Deref for ReadGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: the flag was clear after our count was published, so any
        // writer is still waiting for us and no `&mut T` exists.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T: ?Sized> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.readers.fetch_sub(1, Release);
    }
}

/// Exclusive access returned by [`SpinRwLock::write`].
pub struct WriteGuard<'a, T: ?Sized> {
    lock: &'a SpinRwLock<T>,
    _reentry: ReentrancyGuard<'a>,
}

impl<T: ?Sized> Deref for WriteGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: the write flag is ours and all readers have drained.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T: ?Sized> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above; the guard is the only path to the value.
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T: ?Sized> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.write.store(false, Release);
    }
}
