//! Process syscall handlers: exec, exit, join, memlimit.

use lepton_core::addr::VirtAddr;
use lepton_syscall::PROCESS_TABLE_FULL;

use crate::config::PATH_MAX;
use crate::proc::{JoinError, Pid, SpawnError};

use super::{SyscallDispatcher, userptr};

impl SyscallDispatcher {
    /// `Exec(path)` — spawns a new process from the named executable.
    ///
    /// Returns the new pid, or the table-full sentinel.
    pub(super) fn sys_exec(&self, path: VirtAddr) -> isize {
        let table = self.process.current_address_space();
        let path = userptr::read_str(&*self.vm, table, path, PATH_MAX);
        match self.process.spawn(&path) {
            Ok(pid) => pid as isize,
            Err(SpawnError::TableFull) => PROCESS_TABLE_FULL,
        }
    }

    /// `Exit(retval)` — records the exit value, wakes joiners and ends
    /// the calling thread's user-mode execution. Never returns.
    pub(super) fn sys_exit(&self, retval: isize) -> ! {
        self.process.finish(retval);
        self.threads.exit_thread()
    }

    /// `Join(pid)` — blocks until the target is a Zombie and returns
    /// its exit value; −1 for a pid outside the table.
    pub(super) fn sys_join(&self, pid: Pid) -> isize {
        match self.process.join(pid) {
            Ok(retval) => retval,
            Err(JoinError::InvalidPid) => -1,
        }
    }

    /// `MemLimit(requested)` — heap query or grow-only resize. The null
    /// word result encodes a rejected shrink.
    pub(super) fn sys_mem_limit(&self, requested: Option<VirtAddr>) -> isize {
        match self.process.mem_limit(requested) {
            Some(end) => end.as_usize() as isize,
            None => 0,
        }
    }
}
