//! System-call decoding and dispatch.
//!
//! The sole bridge between the user-mode trap ABI and kernel
//! operations. A trapped [`UserContext`] carries the syscall number in
//! a0 and up to three arguments in a1–a3; [`SyscallRequest::decode`]
//! extracts a typed request from it once, the dispatcher routes it to
//! exactly one handler, writes the result into v0 and advances the
//! program counter by one instruction — on every returning path, so the
//! trapping instruction never re-executes. An unrecognized syscall
//! number is a kernel-fatal error, not a returned code.

mod io;
mod process;
mod sem;
mod userptr;

use alloc::sync::Arc;

use lepton_core::addr::VirtAddr;
use lepton_core::{kfatal, kinfo};

use crate::config::INSTRUCTION_WIDTH;
use crate::hal::{CharConsole, FileSystem, ThreadControl, VirtualMemory};
use crate::proc::{Pid, ProcessManager};
use crate::sem::{self as semtable, SemId, SemaphoreRegistry};

/// Register holding a syscall's return value.
pub const REG_V0: usize = 2;
/// Register holding the syscall number.
pub const REG_A0: usize = 4;
/// First argument register.
pub const REG_A1: usize = 5;
/// Second argument register.
pub const REG_A2: usize = 6;
/// Third argument register.
pub const REG_A3: usize = 7;
/// Stack pointer register.
pub const REG_SP: usize = 29;

/// Register image of a trapped user-mode thread: the CPU registers as
/// they were when the syscall instruction executed in userland. The
/// dispatcher mutates it in place; user execution resumes from it.
#[derive(Debug, Clone)]
pub struct UserContext {
    /// General-purpose registers, by MIPS numbering.
    pub cpu_regs: [usize; 32],
    /// Program counter.
    pub pc: usize,
}

impl UserContext {
    /// An all-zero register image.
    pub const fn zeroed() -> Self {
        Self {
            cpu_regs: [0; 32],
            pc: 0,
        }
    }

    /// The trapped syscall number (a0).
    pub fn syscall_number(&self) -> usize {
        self.cpu_regs[REG_A0]
    }

    /// Fills the syscall slots: number in a0, arguments in a1–a3.
    pub fn set_syscall(&mut self, number: usize, a1: usize, a2: usize, a3: usize) {
        self.cpu_regs[REG_A0] = number;
        self.cpu_regs[REG_A1] = a1;
        self.cpu_regs[REG_A2] = a2;
        self.cpu_regs[REG_A3] = a3;
    }

    /// The returned value (v0), written by the dispatcher.
    pub fn return_value(&self) -> usize {
        self.cpu_regs[REG_V0]
    }

    /// Sets the initial stack pointer.
    pub fn set_stack_pointer(&mut self, sp: VirtAddr) {
        self.cpu_regs[REG_SP] = sp.as_usize();
    }

    /// Sets the program counter.
    pub fn set_pc(&mut self, pc: VirtAddr) {
        self.pc = pc.as_usize();
    }

    fn set_return(&mut self, value: usize) {
        self.cpu_regs[REG_V0] = value;
    }

    fn advance_pc(&mut self) {
        self.pc += INSTRUCTION_WIDTH;
    }
}

/// A decoded system call: operation tag plus typed arguments, extracted
/// from the raw register image in one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallRequest {
    /// Stop the machine.
    Halt,
    /// Terminate the calling process.
    Exit {
        /// Exit value recorded for the joiner.
        retval: isize,
    },
    /// Start a new process.
    Exec {
        /// User address of the NUL-terminated executable path.
        path: VirtAddr,
    },
    /// Wait for a process to finish.
    Join {
        /// Target process.
        pid: Pid,
    },
    /// Read from a console or file handle.
    Read {
        /// User-visible file handle.
        fd: isize,
        /// User address of the destination buffer.
        buf: VirtAddr,
        /// Maximum bytes to read.
        len: usize,
    },
    /// Write to a console or file handle.
    Write {
        /// User-visible file handle.
        fd: isize,
        /// User address of the source buffer.
        buf: VirtAddr,
        /// Bytes to write.
        len: usize,
    },
    /// Open a file.
    Open {
        /// User address of the NUL-terminated path.
        path: VirtAddr,
    },
    /// Close a file handle.
    Close {
        /// User-visible file handle.
        handle: isize,
    },
    /// Reposition a file handle.
    Seek {
        /// User-visible file handle.
        handle: isize,
        /// New absolute position.
        offset: usize,
    },
    /// Create a file.
    Create {
        /// User address of the NUL-terminated path.
        path: VirtAddr,
        /// Size of the created file.
        size: usize,
    },
    /// Delete a file.
    Delete {
        /// User address of the NUL-terminated path.
        path: VirtAddr,
    },
    /// Count the files on a volume.
    FileCount {
        /// User address of the NUL-terminated volume name.
        volume: VirtAddr,
    },
    /// Fetch the name of the n-th file on a volume.
    File {
        /// User address of the NUL-terminated volume name.
        volume: VirtAddr,
        /// File index on the volume.
        index: usize,
        /// User address of the name buffer to fill.
        out: VirtAddr,
    },
    /// Open or attach a named semaphore.
    SemOpen {
        /// User address of the NUL-terminated semaphore name.
        name: VirtAddr,
        /// Initial count (≥ 0: create), or negative (attach).
        value: isize,
    },
    /// Decrement a semaphore.
    SemProcure {
        /// Decoded handle; `None` is the null handle.
        handle: Option<SemId>,
    },
    /// Increment a semaphore.
    SemVacate {
        /// Decoded handle; `None` is the null handle.
        handle: Option<SemId>,
    },
    /// Destroy a semaphore.
    SemDestroy {
        /// Decoded handle; `None` is the null handle.
        handle: Option<SemId>,
    },
    /// Query or raise the calling process's heap end.
    MemLimit {
        /// `None` (the zero word) queries; otherwise the requested new
        /// heap end.
        requested: Option<VirtAddr>,
    },
}

impl SyscallRequest {
    /// Extracts the operation and its typed arguments from a trapped
    /// context. Returns `None` for an unrecognized syscall number.
    pub fn decode(context: &UserContext) -> Option<Self> {
        use lepton_syscall as abi;

        let a1 = context.cpu_regs[REG_A1];
        let a2 = context.cpu_regs[REG_A2];
        let a3 = context.cpu_regs[REG_A3];

        Some(match context.syscall_number() {
            abi::SYS_HALT => Self::Halt,
            abi::SYS_EXIT => Self::Exit { retval: a1 as isize },
            abi::SYS_EXEC => Self::Exec {
                path: VirtAddr::new(a1),
            },
            abi::SYS_JOIN => Self::Join { pid: a1 },
            abi::SYS_READ => Self::Read {
                fd: a1 as isize,
                buf: VirtAddr::new(a2),
                len: a3,
            },
            abi::SYS_WRITE => Self::Write {
                fd: a1 as isize,
                buf: VirtAddr::new(a2),
                len: a3,
            },
            abi::SYS_OPEN => Self::Open {
                path: VirtAddr::new(a1),
            },
            abi::SYS_CLOSE => Self::Close { handle: a1 as isize },
            abi::SYS_SEEK => Self::Seek {
                handle: a1 as isize,
                offset: a2,
            },
            abi::SYS_CREATE => Self::Create {
                path: VirtAddr::new(a1),
                size: a2,
            },
            abi::SYS_DELETE => Self::Delete {
                path: VirtAddr::new(a1),
            },
            abi::SYS_FILECOUNT => Self::FileCount {
                volume: VirtAddr::new(a1),
            },
            abi::SYS_FILE => Self::File {
                volume: VirtAddr::new(a1),
                index: a2,
                out: VirtAddr::new(a3),
            },
            abi::SYS_SEM_OPEN => Self::SemOpen {
                name: VirtAddr::new(a1),
                value: a2 as isize,
            },
            abi::SYS_SEM_PROCURE => Self::SemProcure {
                handle: semtable::token_handle(a1),
            },
            abi::SYS_SEM_VACATE => Self::SemVacate {
                handle: semtable::token_handle(a1),
            },
            abi::SYS_SEM_DESTROY => Self::SemDestroy {
                handle: semtable::token_handle(a1),
            },
            abi::SYS_MEMLIMIT => Self::MemLimit {
                requested: if a1 == 0 {
                    None
                } else {
                    Some(VirtAddr::new(a1))
                },
            },
            _ => return None,
        })
    }
}

/// Routes decoded syscalls to the kernel operations.
pub struct SyscallDispatcher {
    pub(crate) process: Arc<ProcessManager>,
    pub(crate) semaphores: Arc<SemaphoreRegistry>,
    pub(crate) threads: Arc<dyn ThreadControl>,
    pub(crate) vm: Arc<dyn VirtualMemory>,
    pub(crate) console: Arc<dyn CharConsole>,
    pub(crate) fs: Arc<dyn FileSystem>,
}

impl SyscallDispatcher {
    /// Wires the dispatcher to its collaborators.
    pub fn new(
        process: Arc<ProcessManager>,
        semaphores: Arc<SemaphoreRegistry>,
        threads: Arc<dyn ThreadControl>,
        vm: Arc<dyn VirtualMemory>,
        console: Arc<dyn CharConsole>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            process,
            semaphores,
            threads,
            vm,
            console,
            fs,
        }
    }

    /// Handles one trapped system call. Interrupts are enabled for the
    /// duration of dispatch; only the handlers' own critical sections
    /// mask them.
    ///
    /// # Panics
    ///
    /// Panics on an unrecognized syscall number — there is no
    /// error-code path for a malformed request.
    pub fn handle(&self, context: &mut UserContext) {
        let Some(request) = SyscallRequest::decode(context) else {
            kfatal!("unhandled system call {:#x}", context.syscall_number());
            panic!("unhandled system call {:#x}", context.syscall_number());
        };

        let result: isize = match request {
            SyscallRequest::Halt => {
                kinfo!("halting");
                self.threads.halt()
            }
            SyscallRequest::Exit { retval } => self.sys_exit(retval),
            SyscallRequest::Exec { path } => self.sys_exec(path),
            SyscallRequest::Join { pid } => self.sys_join(pid),
            SyscallRequest::Read { fd, buf, len } => self.sys_read(fd, buf, len),
            SyscallRequest::Write { fd, buf, len } => self.sys_write(fd, buf, len),
            SyscallRequest::Open { path } => self.sys_open(path),
            SyscallRequest::Close { handle } => self.sys_close(handle),
            SyscallRequest::Seek { handle, offset } => self.sys_seek(handle, offset),
            SyscallRequest::Create { path, size } => self.sys_create(path, size),
            SyscallRequest::Delete { path } => self.sys_delete(path),
            SyscallRequest::FileCount { volume } => self.sys_filecount(volume),
            SyscallRequest::File { volume, index, out } => self.sys_file(volume, index, out),
            SyscallRequest::SemOpen { name, value } => self.sys_sem_open(name, value),
            SyscallRequest::SemProcure { handle } => self.semaphores.procure(handle),
            SyscallRequest::SemVacate { handle } => self.semaphores.vacate(handle),
            SyscallRequest::SemDestroy { handle } => self.semaphores.destroy(handle),
            SyscallRequest::MemLimit { requested } => self.sys_mem_limit(requested),
        };

        // The one true ABI contract, in one place: result to v0, and
        // the pc past the trapping instruction so it never re-executes.
        context.set_return(result as usize);
        context.advance_pc();
    }
}
