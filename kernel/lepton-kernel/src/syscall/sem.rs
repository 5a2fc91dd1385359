//! Semaphore syscall handlers.
//!
//! Procure, vacate and destroy go straight to the registry from the
//! dispatch table; only open needs a handler, to fetch the name from
//! user memory and encode the resulting handle as a wire token.

use lepton_core::addr::VirtAddr;
use lepton_syscall::SEM_HANDLE_NULL;

use crate::config::SEM_NAME_MAX;
use crate::sem;

use super::{SyscallDispatcher, userptr};

impl SyscallDispatcher {
    /// `SemOpen(name, value)` — create-or-fail (`value ≥ 0`) or
    /// attach-by-name (`value < 0`). Returns the handle token, or the
    /// null word on failure.
    pub(super) fn sys_sem_open(&self, name: VirtAddr, value: isize) -> isize {
        let table = self.process.current_address_space();
        let name = userptr::read_str(&*self.vm, table, name, SEM_NAME_MAX);
        match self.semaphores.open(&name, value) {
            Some(sid) => sem::handle_token(sid) as isize,
            None => SEM_HANDLE_NULL as isize,
        }
    }
}
