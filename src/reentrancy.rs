//! Debug-only reentrancy guard.
//!
//! Tracks, per thread, which spin locks the thread currently holds. A spin
//! lock taken twice by one thread never makes progress: a nested reader
//! waits on a pending writer, which waits on the outer reader. In debug
//! builds entering the same owner twice panics instead of hanging. In
//! release builds this compiles to a zero-cost no-op.

use core::marker::PhantomData;
#[cfg(debug_assertions)]
use std::cell::RefCell;

#[cfg(debug_assertions)]
thread_local! {
    // Addresses of owners entered by this thread, innermost last.
    static HELD: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Enter a guarded section for `owner`. In debug builds, panics if the
/// current thread is already inside a section for the same owner.
///
/// The owner's address is its identity, so `owner` must not be zero-sized.
#[inline]
pub(crate) fn enter<O: ?Sized>(owner: &O) -> ReentrancyGuard<'_> {
    #[cfg(debug_assertions)]
    {
        let addr = owner as *const O as *const () as usize;
        HELD.with(|held| {
            let mut held = held.borrow_mut();
            assert!(
                !held.contains(&addr),
                "reentrancy detected: nested entry into a lock already held by this thread"
            );
            held.push(addr);
        });
        ReentrancyGuard {
            addr,
            _owner: PhantomData,
        }
    }

    #[cfg(not(debug_assertions))]
    {
        let _ = owner;
        ReentrancyGuard {
            _owner: PhantomData,
        }
    }
}

/// RAII guard returned by [`enter`]. Stays on the thread that created it.
pub(crate) struct ReentrancyGuard<'a> {
    #[cfg(debug_assertions)]
    addr: usize,
    // !Send: the record lives in this thread's local storage.
    _owner: PhantomData<(&'a (), *mut ())>,
}

impl Drop for ReentrancyGuard<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            // try_with: guards may outlive the thread-local during teardown.
            let _ = HELD.try_with(|held| {
                let mut held = held.borrow_mut();
                if let Some(pos) = held.iter().rposition(|&a| a == self.addr) {
                    held.remove(pos);
                }
            });
        }
    }
}
