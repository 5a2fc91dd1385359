//! Machine-dependent collaborator traits.
//!
//! Everything the kernel core needs from the machine is one of these
//! seams: thread control, virtual memory, the console character device,
//! the file system and the executable-image parser. The core never
//! assumes more than the documented contracts, so a bare-metal port and
//! the hosted reference machine are interchangeable behind them.

use alloc::boxed::Box;

use bitflags::bitflags;
use lepton_core::addr::{PhysAddr, VirtAddr};
use lepton_core::sync::ThreadPark;

use crate::proc::Pid;
use crate::syscall::UserContext;

/// Exclusive handle to one process's page table, owned by the memory
/// collaborator. The kernel stores it in the process control block and
/// passes it back for every mapping operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTableId(usize);

impl PageTableId {
    /// Wraps a raw table index assigned by the memory collaborator.
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// The raw table index.
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

bitflags! {
    /// Page mapping attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MapFlags: u32 {
        /// The page may be written. Freshly mapped segment pages carry
        /// this until the loader re-marks read-only segments clean.
        const WRITABLE = 1 << 0;
    }
}

/// A kernel access to user memory hit an unmapped or non-writable page.
#[derive(Debug, Clone, Copy)]
pub struct MemFault {
    /// The faulting virtual address.
    pub addr: VirtAddr,
}

/// Thread-of-control primitives, extending the parking seam with
/// creation, process binding and the mode transfers.
pub trait ThreadControl: ThreadPark {
    /// Creates a new kernel thread running `entry` and makes it
    /// runnable. The caller does not wait for it to execute.
    fn spawn_thread(&self, entry: Box<dyn FnOnce() + Send>);

    /// Binds the calling thread to the process it executes, at spawn
    /// time. The binding is carried by the thread for its lifetime.
    fn bind_process(&self, pid: Pid);

    /// The pid the calling thread is bound to, if any.
    fn owning_process(&self) -> Option<Pid>;

    /// Transfers the calling thread to user mode with the given
    /// register image. Never returns.
    fn enter_user(&self, context: UserContext) -> !;

    /// Terminates the calling thread. Never returns.
    fn exit_thread(&self) -> !;

    /// Stops the whole machine. Never returns.
    fn halt(&self) -> !;
}

/// Virtual-memory and translation-cache primitives.
///
/// `read`/`write`/`zero` access user memory through a page table the
/// way the MIPS-like machine would: they fail on unmapped pages, and
/// writes fail on pages whose dirty bit was cleared.
pub trait VirtualMemory: Send + Sync {
    /// Creates an empty page table.
    fn create_page_table(&self) -> PageTableId;

    /// Allocates one physical page, or `None` when the pool is empty.
    fn alloc_page(&self) -> Option<PhysAddr>;

    /// Maps `va` to `phys` in `table`.
    fn map(&self, table: PageTableId, phys: PhysAddr, va: VirtAddr, flags: MapFlags);

    /// Clears the dirty bit of the page at `va`, making it read-only
    /// once the mapping is reinstalled.
    fn set_clean(&self, table: PageTableId, va: VirtAddr);

    /// Installs `table`'s mappings into the fast-lookup translation
    /// cache. Every resident page must fit; there is no miss handling.
    fn tlb_refresh(&self, table: PageTableId);

    /// Number of mappings the translation cache holds.
    fn tlb_capacity(&self) -> usize;

    /// Writes zeroes over `[va, va + len)`.
    fn zero(&self, table: PageTableId, va: VirtAddr, len: usize) -> Result<(), MemFault>;

    /// Copies `bytes` to `va`.
    fn write(&self, table: PageTableId, va: VirtAddr, bytes: &[u8]) -> Result<(), MemFault>;

    /// Fills `buf` from `va`.
    fn read(&self, table: PageTableId, va: VirtAddr, buf: &mut [u8]) -> Result<(), MemFault>;
}

/// The console character device behind file handles 0–2.
pub trait CharConsole: Send + Sync {
    /// Reads up to `buf.len()` bytes; returns the count read, or a
    /// negative device error.
    fn read(&self, buf: &mut [u8]) -> isize;

    /// Writes `buf`; returns the count written, or a negative device
    /// error.
    fn write(&self, buf: &[u8]) -> isize;
}

/// The file-system layer behind file handles ≥ 3 and executable
/// storage. Handles and status codes follow the file-layer convention:
/// non-negative handles, `FS_OK`/negative statuses.
pub trait FileSystem: Send + Sync {
    /// Opens `path`; returns a handle ≥ 0 or a negative error.
    fn open(&self, path: &str) -> isize;

    /// Closes `handle`.
    fn close(&self, handle: isize) -> isize;

    /// Creates `path` with the given size.
    fn create(&self, path: &str, size: usize) -> isize;

    /// Deletes `path`.
    fn remove(&self, path: &str) -> isize;

    /// Moves `handle`'s read/write position.
    fn seek(&self, handle: isize, position: usize) -> isize;

    /// Reads from `handle` at its current position; returns the byte
    /// count or a negative error.
    fn read(&self, handle: isize, buf: &mut [u8]) -> isize;

    /// Writes to `handle` at its current position; returns the byte
    /// count or a negative error.
    fn write(&self, handle: isize, buf: &[u8]) -> isize;

    /// Number of files on the named volume, or a negative error.
    fn file_count(&self, volume: &str) -> isize;

    /// Writes the NUL-terminated name of the `index`-th file on the
    /// volume into `out`.
    fn file_name(&self, volume: &str, index: usize, out: &mut [u8]) -> isize;
}

/// One loadable segment of an executable image. Segments start on page
/// boundaries by layout convention.
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    /// Virtual address the segment loads at.
    pub vaddr: VirtAddr,
    /// Pages the segment occupies.
    pub pages: usize,
    /// Byte offset of the segment's data within the image file.
    pub file_offset: usize,
    /// Byte length of the segment's data.
    pub size: usize,
}

impl Segment {
    /// A zero-length segment at the zero address.
    pub const EMPTY: Self = Self {
        vaddr: VirtAddr::zero(),
        pages: 0,
        file_offset: 0,
        size: 0,
    };

    /// One past the last data byte of the segment.
    pub fn end(&self) -> VirtAddr {
        self.vaddr + self.size
    }
}

/// Entry point and segment layout extracted from an executable image.
#[derive(Debug, Clone, Copy)]
pub struct ProgramImage {
    /// Address execution starts at.
    pub entry_point: VirtAddr,
    /// Read-only (code) segment.
    pub ro: Segment,
    /// Read-write (data) segment.
    pub rw: Segment,
}

/// The executable-image parser.
pub trait ImageLoader: Send + Sync {
    /// Reads the image header through the file layer and extracts the
    /// layout, or `None` when the file is not a valid image.
    fn parse(&self, fs: &dyn FileSystem, file: isize) -> Option<ProgramImage>;
}
