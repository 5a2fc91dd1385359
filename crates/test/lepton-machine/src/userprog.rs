//! The user-program API.
//!
//! A program installed on the machine is a closure that receives a
//! [`UserApi`] — the analog of the userland syscall library. Every call
//! builds a trap context, stages string and buffer arguments into the
//! process's own stack page, dispatches through the kernel, and checks
//! that the program counter moved past exactly one instruction.

use std::cell::Cell;
use std::sync::Arc;

use lepton_core::addr::VirtAddr;
use lepton_kernel::config::{INSTRUCTION_WIDTH, PAGE_SIZE, USERLAND_STACK_TOP};
use lepton_kernel::hal::{PageTableId, VirtualMemory};
use lepton_kernel::proc::Pid;
use lepton_kernel::syscall::UserContext;
use lepton_kernel::Kernel;
use lepton_syscall as abi;

use crate::Machine;

/// Behavior of an installed program: runs against the syscall API and
/// returns the process's exit value (the userland startup stub turns a
/// plain return into an Exit syscall).
pub type ProgramBody = Arc<dyn Fn(&UserApi) -> isize + Send + Sync>;

/// Wraps a closure as a [`ProgramBody`].
pub fn program(body: impl Fn(&UserApi) -> isize + Send + Sync + 'static) -> ProgramBody {
    Arc::new(body)
}

/// Syscall interface handed to a running user program.
pub struct UserApi {
    machine: Arc<Machine>,
    kernel: Arc<Kernel>,
    pid: Pid,
    page_table: PageTableId,
    entry: usize,
    pc: Cell<usize>,
    stage: Cell<usize>,
}

impl UserApi {
    pub(crate) fn new(machine: Arc<Machine>, pid: Pid, context: &UserContext) -> Self {
        let kernel = machine.kernel();
        let page_table = kernel
            .process
            .with_entry(pid, |entry| entry.address_space)
            .expect("user program without an address space");
        Self {
            machine,
            kernel,
            pid,
            page_table,
            entry: context.pc,
            pc: Cell::new(context.pc),
            stage: Cell::new(0),
        }
    }

    /// The pid this program runs as.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// The entry point this program was loaded at. Its read-only
    /// segment starts here, its read-write segment one page later.
    pub fn entry_point(&self) -> usize {
        self.entry
    }

    fn syscall(&self, number: usize, a1: usize, a2: usize, a3: usize) -> usize {
        let mut context = UserContext::zeroed();
        context.set_syscall(number, a1, a2, a3);
        context.pc = self.pc.get();
        self.kernel.handle_syscall(&mut context);
        assert_eq!(
            context.pc,
            self.pc.get() + INSTRUCTION_WIDTH,
            "pc must advance one instruction per syscall"
        );
        self.pc.set(context.pc);
        context.return_value()
    }

    // Arguments are staged into the top stack page, below the initial
    // stack pointer; the region is recycled per call since the kernel
    // consumes everything during the dispatch.
    fn reset_stage(&self) {
        self.stage
            .set(USERLAND_STACK_TOP.align_down(PAGE_SIZE).as_usize());
    }

    fn stage_bytes(&self, bytes: &[u8]) -> usize {
        let va = self.stage.get();
        self.machine
            .memory
            .write(self.page_table, VirtAddr::new(va), bytes)
            .expect("staging into the stack page failed");
        self.stage.set(va + bytes.len());
        va
    }

    fn stage_str(&self, s: &str) -> usize {
        let va = self.stage_bytes(s.as_bytes());
        self.stage_bytes(&[0]);
        va
    }

    fn reserve(&self, len: usize) -> usize {
        let va = self.stage.get();
        self.stage.set(va + len);
        va
    }

    /// Stops the machine.
    pub fn halt(&self) -> ! {
        self.syscall(abi::SYS_HALT, 0, 0, 0);
        unreachable!("halt returned");
    }

    /// Terminates this process with `code`.
    pub fn exit(&self, code: isize) -> ! {
        self.syscall(abi::SYS_EXIT, code as usize, 0, 0);
        unreachable!("exit returned");
    }

    /// Spawns the named executable; the new pid, or the table-full
    /// sentinel.
    pub fn exec(&self, path: &str) -> isize {
        self.reset_stage();
        let path = self.stage_str(path);
        self.syscall(abi::SYS_EXEC, path, 0, 0) as isize
    }

    /// Waits for process `pid` and returns its exit value.
    pub fn join(&self, pid: isize) -> isize {
        self.syscall(abi::SYS_JOIN, pid as usize, 0, 0) as isize
    }

    /// Reads up to `len` bytes from a console or file handle.
    pub fn read(&self, fd: isize, len: usize) -> (isize, Vec<u8>) {
        self.reset_stage();
        let buf = self.reserve(len);
        let count = self.syscall(abi::SYS_READ, fd as usize, buf, len) as isize;
        let mut data = Vec::new();
        if count > 0 {
            data = self.peek(buf, count as usize);
        }
        (count, data)
    }

    /// Writes `data` to a console or file handle.
    pub fn write(&self, fd: isize, data: &[u8]) -> isize {
        self.reset_stage();
        let buf = self.stage_bytes(data);
        self.syscall(abi::SYS_WRITE, fd as usize, buf, data.len()) as isize
    }

    /// Writes a string to the console.
    pub fn print(&self, s: &str) -> isize {
        self.write(abi::FD_STDOUT, s.as_bytes())
    }

    /// Opens a file; a handle ≥ 3 or a negative error.
    pub fn open(&self, path: &str) -> isize {
        self.reset_stage();
        let path = self.stage_str(path);
        self.syscall(abi::SYS_OPEN, path, 0, 0) as isize
    }

    /// Closes a file handle.
    pub fn close(&self, handle: isize) -> isize {
        self.syscall(abi::SYS_CLOSE, handle as usize, 0, 0) as isize
    }

    /// Repositions a file handle.
    pub fn seek(&self, handle: isize, position: usize) -> isize {
        self.syscall(abi::SYS_SEEK, handle as usize, position, 0) as isize
    }

    /// Creates a file of the given size.
    pub fn create(&self, path: &str, size: usize) -> isize {
        self.reset_stage();
        let path = self.stage_str(path);
        self.syscall(abi::SYS_CREATE, path, size, 0) as isize
    }

    /// Deletes a file.
    pub fn delete(&self, path: &str) -> isize {
        self.reset_stage();
        let path = self.stage_str(path);
        self.syscall(abi::SYS_DELETE, path, 0, 0) as isize
    }

    /// Counts the files on a volume.
    pub fn file_count(&self, volume: &str) -> isize {
        self.reset_stage();
        let volume = self.stage_str(volume);
        self.syscall(abi::SYS_FILECOUNT, volume, 0, 0) as isize
    }

    /// Fetches the name of the `index`-th file on a volume.
    pub fn file_name(&self, volume: &str, index: usize) -> (isize, String) {
        self.reset_stage();
        let volume = self.stage_str(volume);
        let out = self.reserve(lepton_kernel::config::FILE_NAME_MAX);
        let status = self.syscall(abi::SYS_FILE, volume, index, out) as isize;
        let mut name = String::new();
        if status == abi::FS_OK {
            let bytes = self.peek(out, lepton_kernel::config::FILE_NAME_MAX);
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            name = String::from_utf8_lossy(&bytes[..end]).into_owned();
        }
        (status, name)
    }

    /// Opens or attaches a named semaphore; a handle token, or the
    /// null word.
    pub fn sem_open(&self, name: &str, value: isize) -> usize {
        self.reset_stage();
        let name = self.stage_str(name);
        self.syscall(abi::SYS_SEM_OPEN, name, value as usize, 0)
    }

    /// Decrements a semaphore, blocking while it is zero.
    pub fn sem_procure(&self, handle: usize) -> isize {
        self.syscall(abi::SYS_SEM_PROCURE, handle, 0, 0) as isize
    }

    /// Increments a semaphore.
    pub fn sem_vacate(&self, handle: usize) -> isize {
        self.syscall(abi::SYS_SEM_VACATE, handle, 0, 0) as isize
    }

    /// Destroys a semaphore.
    pub fn sem_destroy(&self, handle: usize) -> isize {
        self.syscall(abi::SYS_SEM_DESTROY, handle, 0, 0) as isize
    }

    /// Queries (`None`) or raises the heap end; the resulting heap end,
    /// or 0 for a rejected shrink.
    pub fn mem_limit(&self, requested: Option<usize>) -> usize {
        self.syscall(abi::SYS_MEMLIMIT, requested.unwrap_or(0), 0, 0)
    }

    /// Reads this process's memory directly — the test harness's
    /// window into the machine, not a syscall.
    pub fn peek(&self, va: usize, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        self.machine
            .memory
            .read(self.page_table, VirtAddr::new(va), &mut bytes)
            .expect("peek of unmapped memory");
        bytes
    }

    /// Writes this process's memory directly — the test harness's
    /// window into the machine, not a syscall.
    pub fn poke(&self, va: usize, data: &[u8]) {
        self.machine
            .memory
            .write(self.page_table, VirtAddr::new(va), data)
            .expect("poke of unmapped memory");
    }
}
