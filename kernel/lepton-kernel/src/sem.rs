//! User-visible named semaphores.
//!
//! A fixed table of named counting semaphores under its own
//! interrupts-off spin lock. `open` with a non-negative count is
//! create-or-fail, `open` with a negative count attaches to an existing
//! name. Each Used entry owns a backing kernel [`Semaphore`]; procure
//! and vacate forward to it outside the registry lock, destroy releases
//! it and returns the slot to Free.
//!
//! There is no reference counting: destroying a semaphore that another
//! caller still holds a handle to is a caller error. The registry stays
//! memory-safe regardless — a stale handle just stops resolving.

use alloc::sync::Arc;

use lepton_core::name::FixedName;
use lepton_core::sync::{IrqSpinLock, Semaphore, ThreadPark};
use lepton_core::kdebug;
use lepton_syscall::SEM_ERROR;

use crate::config::{MAX_USER_SEMAPHORES, SEM_NAME_MAX};

/// Semaphore identity: the index of the registry slot, meaningful while
/// the slot is Used and reusable once it is destroyed.
pub type SemId = usize;

/// Occupancy of a registry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    Used,
}

struct SemaphoreEntry {
    state: SlotState,
    sid: SemId,
    name: FixedName<SEM_NAME_MAX>,
    ksem: Option<Arc<Semaphore>>,
}

impl SemaphoreEntry {
    const FREE: Self = Self {
        state: SlotState::Free,
        sid: 0,
        name: FixedName::EMPTY,
        ksem: None,
    };
}

/// At the syscall boundary a handle travels as a one-based slot token
/// so the all-zero machine word stays "null".
pub fn handle_token(sid: SemId) -> usize {
    sid + 1
}

/// Decodes a wire token back to a handle; the zero word is null.
pub fn token_handle(token: usize) -> Option<SemId> {
    token.checked_sub(1)
}

/// The named-semaphore table.
///
/// Created once at boot and never torn down; slots recycle on destroy.
pub struct SemaphoreRegistry {
    table: IrqSpinLock<[SemaphoreEntry; MAX_USER_SEMAPHORES]>,
    park: Arc<dyn ThreadPark>,
}

impl SemaphoreRegistry {
    /// Creates the registry with every slot Free.
    pub fn new(park: Arc<dyn ThreadPark>) -> Arc<Self> {
        Arc::new(Self {
            table: IrqSpinLock::new([const { SemaphoreEntry::FREE }; MAX_USER_SEMAPHORES]),
            park,
        })
    }

    /// Opens a semaphore.
    ///
    /// `value >= 0` requests creation: `None` when a semaphore with the
    /// name already exists (no silent attach) or the table is full;
    /// otherwise the first Free slot is claimed, the backing kernel
    /// semaphore is created with `value`, and the new sid is returned.
    ///
    /// `value < 0` requests attachment: the sid of the existing Used
    /// entry with the name, or `None` when there is none.
    pub fn open(&self, name: &str, value: isize) -> Option<SemId> {
        if value >= 0 {
            self.create(name, value as usize)
        } else {
            self.attach(name)
        }
    }

    fn create(&self, name: &str, value: usize) -> Option<SemId> {
        let name = FixedName::from_str(name);
        let mut table = self.table.lock();

        if table
            .iter()
            .any(|entry| entry.state == SlotState::Used && entry.name == name)
        {
            return None;
        }

        let sid = table
            .iter()
            .position(|entry| entry.state == SlotState::Free)?;

        table[sid] = SemaphoreEntry {
            state: SlotState::Used,
            sid,
            name,
            ksem: Some(Arc::new(Semaphore::new(value, self.park.clone()))),
        };
        kdebug!("semaphore {sid}: created '{name}' with count {value}");
        Some(sid)
    }

    fn attach(&self, name: &str) -> Option<SemId> {
        let name = FixedName::from_str(name);
        let table = self.table.lock();
        table
            .iter()
            .find(|entry| entry.state == SlotState::Used && entry.name == name)
            .map(|entry| entry.sid)
    }

    /// Decrements the semaphore, blocking while its count is zero.
    /// Returns 0, or −1 for a null (or stale) handle.
    pub fn procure(&self, handle: Option<SemId>) -> isize {
        match self.resolve(handle) {
            Some(sem) => {
                sem.procure();
                0
            }
            None => SEM_ERROR,
        }
    }

    /// Increments the semaphore, waking one blocked procurer. Returns
    /// 0, or −1 for a null (or stale) handle.
    pub fn vacate(&self, handle: Option<SemId>) -> isize {
        match self.resolve(handle) {
            Some(sem) => {
                sem.vacate();
                0
            }
            None => SEM_ERROR,
        }
    }

    /// Releases the backing kernel semaphore and returns the slot to
    /// Free, making its index reusable. Returns 0, or −1 for a null (or
    /// stale) handle.
    pub fn destroy(&self, handle: Option<SemId>) -> isize {
        let Some(sid) = handle else {
            return SEM_ERROR;
        };
        let released = {
            let mut table = self.table.lock();
            match table.get_mut(sid) {
                Some(entry) if entry.state == SlotState::Used => {
                    entry.state = SlotState::Free;
                    entry.name = FixedName::EMPTY;
                    entry.ksem.take()
                }
                _ => return SEM_ERROR,
            }
        };
        kdebug!("semaphore {sid}: destroyed");
        // The last handle drops the kernel semaphore outside the lock.
        drop(released);
        0
    }

    fn resolve(&self, handle: Option<SemId>) -> Option<Arc<Semaphore>> {
        let sid = handle?;
        let table = self.table.lock();
        let entry = table.get(sid)?;
        if entry.state != SlotState::Used {
            return None;
        }
        // Clone out so the blocking procure happens outside the
        // registry lock.
        entry.ksem.clone()
    }
}
