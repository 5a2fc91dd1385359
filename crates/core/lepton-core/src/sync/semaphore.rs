//! Blocking counting semaphore.
//!
//! The kernel semaphore primitive behind the user-visible semaphore
//! registry. The count and the waiter queue live under one
//! [`IrqSpinLock`]; blocking goes through the [`ThreadPark`] seam with
//! the same release-block-reacquire-recheck discipline the process
//! wait-set uses, so spurious wake-ups are harmless.

use alloc::collections::VecDeque;
use alloc::sync::Arc;

use super::{IrqSpinLock, ThreadPark};

/// A counting semaphore whose `procure` blocks the calling thread while
/// the count is zero.
pub struct Semaphore {
    inner: IrqSpinLock<Inner>,
    park: Arc<dyn ThreadPark>,
}

struct Inner {
    count: usize,
    waiters: VecDeque<super::ThreadId>,
}

impl Semaphore {
    /// Creates a semaphore with the given initial count.
    pub fn new(count: usize, park: Arc<dyn ThreadPark>) -> Self {
        Self {
            inner: IrqSpinLock::new(Inner {
                count,
                waiters: VecDeque::new(),
            }),
            park,
        }
    }

    /// Decrements the count, blocking while it is zero.
    pub fn procure(&self) {
        loop {
            let mut inner = self.inner.lock();
            if inner.count > 0 {
                inner.count -= 1;
                return;
            }
            // Register before releasing the lock: a vacate that runs in
            // between will arm our next block_current, so the wake
            // cannot be lost. Re-registration after a spurious wake just
            // queues a harmless extra token.
            let me = self.park.current_thread();
            inner.waiters.push_back(me);
            drop(inner);
            self.park.block_current();
        }
    }

    /// Increments the count and wakes one queued waiter.
    pub fn vacate(&self) {
        let waiter = {
            let mut inner = self.inner.lock();
            inner.count += 1;
            inner.waiters.pop_front()
        };
        if let Some(thread) = waiter {
            self.park.unblock(thread);
        }
    }

    /// The current count. Racy by nature; for diagnostics and tests.
    pub fn count(&self) -> usize {
        self.inner.lock().count
    }
}
