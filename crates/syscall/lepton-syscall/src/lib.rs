//! Lepton syscall ABI constants.
//!
//! Shared between the kernel dispatcher and userland: syscall numbers,
//! result sentinels, the file-handle numbering convention and the file
//! layer status codes. Grouped numbering with room for expansion per
//! category.

#![no_std]

// ── Process management (0x001–0x0FF) ─────────────────────────────────

/// Stop the machine. Never returns.
pub const SYS_HALT: usize = 0x001;
/// Start a new process from a stored executable. Returns the pid, or
/// [`PROCESS_TABLE_FULL`].
pub const SYS_EXEC: usize = 0x002;
/// Terminate the calling process with a return value. Never returns to
/// the caller.
pub const SYS_EXIT: usize = 0x003;
/// Block until the given process finishes; returns its exit value.
pub const SYS_JOIN: usize = 0x004;

// ── File and console I/O (0x101–0x1FF) ───────────────────────────────

/// Open a file by path. Returns a handle ≥ [`FD_FILE_BASE`], or a
/// negative file-layer error.
pub const SYS_OPEN: usize = 0x101;
/// Close an open file handle.
pub const SYS_CLOSE: usize = 0x102;
/// Set the read/write position of an open file handle.
pub const SYS_SEEK: usize = 0x103;
/// Read from a console or file handle into a buffer.
pub const SYS_READ: usize = 0x104;
/// Write a buffer to a console or file handle.
pub const SYS_WRITE: usize = 0x105;
/// Create a file with the given size.
pub const SYS_CREATE: usize = 0x106;
/// Delete a file by path.
pub const SYS_DELETE: usize = 0x107;
/// Count the files on a volume.
pub const SYS_FILECOUNT: usize = 0x108;
/// Fetch the name of the n-th file on a volume.
pub const SYS_FILE: usize = 0x109;

// ── User semaphores (0x201–0x2FF) ────────────────────────────────────

/// Open a named semaphore: create-or-fail when the count argument is
/// non-negative, attach-by-name when it is negative. Returns a handle
/// token, or [`SEM_HANDLE_NULL`].
pub const SYS_SEM_OPEN: usize = 0x201;
/// Decrement a semaphore, blocking while its count is zero.
pub const SYS_SEM_PROCURE: usize = 0x202;
/// Increment a semaphore, waking one blocked procurer.
pub const SYS_SEM_VACATE: usize = 0x203;
/// Destroy a semaphore, releasing its backing kernel semaphore.
pub const SYS_SEM_DESTROY: usize = 0x204;

// ── Memory (0x301–0x3FF) ─────────────────────────────────────────────

/// Query (argument 0) or raise (any other argument) the heap end of the
/// calling process. The heap never shrinks; a shrink request returns 0.
pub const SYS_MEMLIMIT: usize = 0x301;

// ── Result sentinels ─────────────────────────────────────────────────

/// Returned by [`SYS_EXEC`] when every process-table slot is occupied.
pub const PROCESS_TABLE_FULL: isize = -1;

/// The null semaphore handle token. Semaphore operations applied to it
/// return [`SEM_ERROR`] instead of trapping.
pub const SEM_HANDLE_NULL: usize = 0;

/// Returned by semaphore operations invoked on a null handle.
pub const SEM_ERROR: isize = -1;

// ── File-handle numbering ────────────────────────────────────────────
//
// Handles 0/1/2 are reserved for the console triad and never reach the
// file layer; handle n ≥ 3 addresses internal file-layer handle n − 3.

/// Console input.
pub const FD_STDIN: isize = 0;
/// Console output.
pub const FD_STDOUT: isize = 1;
/// Console error output.
pub const FD_STDERR: isize = 2;
/// First user-visible file handle; subtracted to reach the file layer.
pub const FD_FILE_BASE: isize = 3;

// ── File layer status codes ──────────────────────────────────────────

/// Operation completed.
pub const FS_OK: isize = 0;
/// Generic failure (bad handle, out-of-range position, full table).
pub const FS_ERROR: isize = -1;
/// The named file or volume does not exist.
pub const FS_NOT_FOUND: isize = -2;
