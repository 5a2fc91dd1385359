//! Compile-time kernel configuration.
//!
//! One constants module as the single source of truth for table sizes
//! and address-space geometry.

use lepton_core::addr::VirtAddr;

/// Size of one page, in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Width of one instruction, in bytes. The program counter advances by
/// this much past a completed system call.
pub const INSTRUCTION_WIDTH: usize = 4;

/// Number of process-table slots. A slot index is the pid.
pub const MAX_PROCESSES: usize = 32;

/// Capacity of a process's stored executable name.
pub const PROCESS_NAME_MAX: usize = 64;

/// Number of user-semaphore-table slots. A slot index is the sid.
pub const MAX_USER_SEMAPHORES: usize = 16;

/// Capacity of a user semaphore's stored name.
pub const SEM_NAME_MAX: usize = 32;

/// Longest path accepted from user space.
pub const PATH_MAX: usize = 256;

/// Size of the buffer a file-listing request fills with one
/// NUL-terminated file name.
pub const FILE_NAME_MAX: usize = 64;

/// Initial user stack pointer; the stack grows down from here.
pub const USERLAND_STACK_TOP: VirtAddr = VirtAddr::new(0x7fff_effc);

/// Pages of user stack mapped at process start.
pub const USER_STACK_PAGES: usize = 2;
