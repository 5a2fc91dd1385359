//! Wait-set keyed by process identity.
//!
//! Replaces a sleep queue keyed by slot address: joiners register the
//! calling thread against the pid they wait on, and `finish` wakes
//! every registration for its pid. Wake-ups carry no information — the
//! woken thread must recheck its condition under the table lock.

use alloc::sync::Arc;
use alloc::vec::Vec;

use lepton_core::sync::{IrqSpinLock, ThreadId, ThreadPark};

use crate::proc::Pid;

/// Registry of parked threads, each tied to the pid it waits on.
pub(super) struct WaitSet {
    waiters: IrqSpinLock<Vec<(Pid, ThreadId)>>,
    park: Arc<dyn ThreadPark>,
}

impl WaitSet {
    pub(super) fn new(park: Arc<dyn ThreadPark>) -> Self {
        Self {
            waiters: IrqSpinLock::new(Vec::new()),
            park,
        }
    }

    /// Ties `thread` to `pid`. Called with the process-table lock held,
    /// before the waiter releases it and blocks; an `unblock` that
    /// arrives in between is not lost (park-token semantics). A thread
    /// re-registering after a spurious wake just queues an extra
    /// harmless token.
    pub(super) fn register(&self, pid: Pid, thread: ThreadId) {
        self.waiters.lock().push((pid, thread));
    }

    /// Wakes every thread registered for `pid`. The registrations are
    /// drained under the wait-set lock, the unblocks delivered outside
    /// it.
    pub(super) fn wake_all(&self, pid: Pid) {
        let woken: Vec<ThreadId> = {
            let mut waiters = self.waiters.lock();
            let mut woken = Vec::new();
            waiters.retain(|&(waited, thread)| {
                if waited == pid {
                    woken.push(thread);
                    false
                } else {
                    true
                }
            });
            woken
        };
        for thread in woken {
            self.park.unblock(thread);
        }
    }
}
