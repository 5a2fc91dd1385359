//! Process management.
//!
//! A fixed table of process control blocks under one interrupts-off
//! spin lock, plus the lifecycle operations: `spawn` claims a slot and
//! creates the thread, `run`/`start` turn the stored executable into a
//! running user-mode process on that thread, `finish` records the exit
//! value and wakes joiners, `join` blocks until the target is a zombie
//! and reclaims the slot.
//!
//! Lifecycle per slot: **Free → Running → Zombie → (join) → Free**.
//! No other transitions exist, and exactly one thread of control
//! executes as a given non-Free slot at a time.

mod heap;
mod waitset;

use alloc::boxed::Box;
use alloc::sync::{Arc, Weak};
use alloc::vec;

use lepton_core::addr::VirtAddr;
use lepton_core::name::FixedName;
use lepton_core::sync::{IrqSpinLock, ThreadPark};
use lepton_core::{kdebug, kinfo};
use lepton_syscall::FS_OK;

use crate::config::{
    MAX_PROCESSES, PAGE_SIZE, PROCESS_NAME_MAX, USER_STACK_PAGES, USERLAND_STACK_TOP,
};
use crate::hal::{FileSystem, ImageLoader, MapFlags, PageTableId, ThreadControl, VirtualMemory};
use crate::syscall::UserContext;

use waitset::WaitSet;

/// Process identity: the index of the table slot, stable for the slot's
/// occupancy and reusable the instant the slot returns to Free.
pub type Pid = usize;

/// Lifecycle state of a process-table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Unoccupied; the slot may be claimed by `spawn`.
    Free,
    /// A thread of control executes as this slot.
    Running,
    /// Terminated; the exit value waits for a `join`.
    Zombie,
}

/// One process-table slot.
#[derive(Clone, Copy)]
pub struct ProcessControlBlock {
    /// Lifecycle state.
    pub status: ProcessStatus,
    /// Executable name, copied at spawn time, owned by the slot.
    pub filename: FixedName<PROCESS_NAME_MAX>,
    /// Exit value; meaningful only while `status` is `Zombie`.
    pub retval: isize,
    /// The process's page table, created by `start`.
    pub address_space: Option<PageTableId>,
    /// One past the top of the dynamically extendable heap.
    pub heap_end: VirtAddr,
}

impl ProcessControlBlock {
    const FREE: Self = Self {
        status: ProcessStatus::Free,
        filename: FixedName::EMPTY,
        retval: 0,
        address_space: None,
        heap_end: VirtAddr::zero(),
    };
}

/// Recoverable spawn failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// Every process-table slot is occupied; nothing was mutated.
    TableFull,
}

/// Recoverable join failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    /// The pid does not name a table slot.
    InvalidPid,
}

/// The process table and lifecycle controller.
///
/// Created once at boot, before any user process runs, and never torn
/// down; slots recycle. All table mutation happens under the single
/// table-wide lock with interrupts held off for the critical section.
pub struct ProcessManager {
    table: IrqSpinLock<[ProcessControlBlock; MAX_PROCESSES]>,
    waiters: WaitSet,
    threads: Arc<dyn ThreadControl>,
    vm: Arc<dyn VirtualMemory>,
    fs: Arc<dyn FileSystem>,
    loader: Arc<dyn ImageLoader>,
    // Handed to spawned threads so they can reach their manager.
    self_ref: Weak<ProcessManager>,
}

impl ProcessManager {
    /// Creates the process table with every slot Free. The boot-time
    /// `init` of this subsystem; called exactly once.
    pub fn new(
        threads: Arc<dyn ThreadControl>,
        park: Arc<dyn ThreadPark>,
        vm: Arc<dyn VirtualMemory>,
        fs: Arc<dyn FileSystem>,
        loader: Arc<dyn ImageLoader>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            table: IrqSpinLock::new([ProcessControlBlock::FREE; MAX_PROCESSES]),
            waiters: WaitSet::new(park),
            threads,
            vm,
            fs,
            loader,
            self_ref: self_ref.clone(),
        })
    }

    /// The pid bound to the calling thread of control, set at spawn
    /// time. `None` on a thread that runs no process.
    pub fn current_pid(&self) -> Option<Pid> {
        self.threads.owning_process()
    }

    /// Runs `f` with the slot for `pid` under the table lock.
    ///
    /// # Panics
    ///
    /// Panics if `pid` is out of range.
    pub fn with_entry<R>(&self, pid: Pid, f: impl FnOnce(&ProcessControlBlock) -> R) -> R {
        let table = self.table.lock();
        f(&table[pid])
    }

    /// Runs `f` with the calling thread's own slot under the table
    /// lock. After spawn time the slot belongs to the running thread
    /// itself, so reads of one's own accounting (such as `heap_end`)
    /// race with nothing.
    ///
    /// # Panics
    ///
    /// Panics on a thread with no owning process.
    pub fn with_current_entry<R>(&self, f: impl FnOnce(&ProcessControlBlock) -> R) -> R {
        let pid = self.current_pid().expect("no owning process");
        self.with_entry(pid, f)
    }

    /// Starts a new process running `executable`.
    ///
    /// Claims the first Free slot, records the executable name, marks
    /// the slot Running and creates a runnable thread that will enter
    /// [`run`](Self::run). Returns the pid immediately; the caller does
    /// not wait for the new process to begin executing.
    pub fn spawn(&self, executable: &str) -> Result<Pid, SpawnError> {
        let mut table = self.table.lock();

        let pid = table
            .iter()
            .position(|entry| entry.status == ProcessStatus::Free)
            .ok_or(SpawnError::TableFull)?;

        table[pid] = ProcessControlBlock {
            status: ProcessStatus::Running,
            filename: FixedName::from_str(executable),
            ..ProcessControlBlock::FREE
        };

        kdebug!("process {pid}: spawned for '{executable}'");

        let manager = self.self_ref.upgrade().expect("process manager dropped");
        self.threads.spawn_thread(Box::new(move || manager.run(pid)));

        Ok(pid)
    }

    /// Entered by the thread created in [`spawn`](Self::spawn), never
    /// by the spawner: binds the thread to its pid and starts the
    /// recorded executable. Never returns.
    fn run(&self, pid: Pid) -> ! {
        self.threads.bind_process(pid);
        let filename = {
            let table = self.table.lock();
            table[pid].filename
        };
        self.start(filename.as_str())
    }

    /// Builds the calling process's address space from `executable` and
    /// transfers to user mode. Never returns.
    ///
    /// Startup is asserted, not recovered: a missing or malformed
    /// executable, an exhausted page pool or an image too large for the
    /// translation cache all halt the kernel. Only kernel-trusted
    /// startup goes through here, never arbitrary dynamic creation on
    /// behalf of untrusted callers.
    fn start(&self, executable: &str) -> ! {
        let pid = self
            .threads
            .owning_process()
            .expect("start: thread has no owning process");

        kinfo!("process {pid}: starting '{executable}'");

        // A thread that already has an address space is trying to run a
        // userland image for a second time.
        {
            let table = self.table.lock();
            assert!(
                table[pid].address_space.is_none(),
                "start: process {pid} already has an address space"
            );
        }

        let page_table = self.vm.create_page_table();
        {
            let mut table = self.table.lock();
            table[pid].address_space = Some(page_table);
        }

        let file = self.fs.open(executable);
        assert!(file >= 0, "start: executable '{executable}' not found");
        let image = self
            .loader
            .parse(&*self.fs, file)
            .expect("start: not a valid executable image");

        // Naive sanity check: nothing may run out of the zero page.
        assert!(
            image.entry_point.as_usize() >= PAGE_SIZE,
            "start: entry point below the first page"
        );

        // Without miss handling, every page of the process must stay
        // resident in the translation cache at once.
        let footprint = image.ro.pages + image.rw.pages + USER_STACK_PAGES;
        assert!(
            footprint <= self.vm.tlb_capacity(),
            "start: image needs {footprint} resident pages, the cache holds {}",
            self.vm.tlb_capacity()
        );

        // Stack pages, growing down from the fixed top of userland.
        let stack_top_page = USERLAND_STACK_TOP.align_down(PAGE_SIZE);
        for i in 0..USER_STACK_PAGES {
            let phys = self.vm.alloc_page().expect("start: out of physical pages");
            self.vm
                .map(page_table, phys, stack_top_page - i * PAGE_SIZE, MapFlags::WRITABLE);
        }

        // Segment pages. Everything starts writable; read-only pages
        // are re-marked clean after their bytes are in place.
        for seg in [&image.ro, &image.rw] {
            for i in 0..seg.pages {
                let phys = self.vm.alloc_page().expect("start: out of physical pages");
                self.vm
                    .map(page_table, phys, seg.vaddr + i * PAGE_SIZE, MapFlags::WRITABLE);
            }
        }

        self.vm.tlb_refresh(page_table);

        // The mapped addresses are usable from here on.
        let stack_bottom = stack_top_page - (USER_STACK_PAGES - 1) * PAGE_SIZE;
        self.vm
            .zero(page_table, stack_bottom, USER_STACK_PAGES * PAGE_SIZE)
            .expect("start: stack pages not mapped");
        for seg in [&image.ro, &image.rw] {
            if seg.pages > 0 {
                self.vm
                    .zero(page_table, seg.vaddr, seg.pages * PAGE_SIZE)
                    .expect("start: segment pages not mapped");
            }
        }

        // Copy each segment from its recorded position in the image.
        for seg in [&image.ro, &image.rw] {
            if seg.size > 0 {
                assert!(
                    seg.vaddr.as_usize() >= PAGE_SIZE,
                    "start: segment in the zero page"
                );
                assert_eq!(
                    self.fs.seek(file, seg.file_offset),
                    FS_OK,
                    "start: seek to segment failed"
                );
                let mut bytes = vec![0u8; seg.size];
                assert_eq!(
                    self.fs.read(file, &mut bytes),
                    seg.size as isize,
                    "start: short read of segment"
                );
                self.vm
                    .write(page_table, seg.vaddr, &bytes)
                    .expect("start: segment pages not mapped");
            }
        }

        // Drop the dirty bit on code pages and reinstall the mappings
        // so the clean bit takes effect.
        for i in 0..image.ro.pages {
            self.vm.set_clean(page_table, image.ro.vaddr + i * PAGE_SIZE);
        }
        self.vm.tlb_refresh(page_table);

        // The heap begins where the loaded image ends.
        let heap_end = VirtAddr::new(core::cmp::max(
            image.ro.end().as_usize(),
            image.rw.end().as_usize(),
        ));
        {
            let mut table = self.table.lock();
            table[pid].heap_end = heap_end;
        }

        let mut context = UserContext::zeroed();
        context.set_stack_pointer(USERLAND_STACK_TOP);
        context.set_pc(image.entry_point);
        self.threads.enter_user(context)
    }

    /// Records the calling process's exit value, marks its slot Zombie
    /// and wakes every thread sleeping on it. The retval and Zombie
    /// writes happen strictly before the wake, under the same lock
    /// hold, so a joiner that observes Zombie also observes the correct
    /// retval.
    ///
    /// # Panics
    ///
    /// Panics on a thread with no owning process.
    pub fn finish(&self, retval: isize) {
        let pid = self
            .threads
            .owning_process()
            .expect("finish: thread has no owning process");

        let mut table = self.table.lock();
        table[pid].retval = retval;
        table[pid].status = ProcessStatus::Zombie;
        kdebug!("process {pid}: finished with {retval}");
        self.waiters.wake_all(pid);
    }

    /// Blocks until process `pid` is a Zombie, frees its slot and
    /// returns its exit value.
    ///
    /// Sleep/recheck loop: while the slot is not Zombie, register as a
    /// sleeper, release the table lock, yield the processor, reacquire
    /// and recheck. The recheck after waking is mandatory — a wake can
    /// be spurious, or racing with another joiner.
    ///
    /// Only one joiner consumes a given Zombie correctly. Two threads
    /// joining the same pid concurrently is undefined: both may observe
    /// Zombie and both "win", and a join against an already-freed slot
    /// blocks until that slot's next occupant finishes. Both are caller
    /// errors, not enforced here.
    pub fn join(&self, pid: Pid) -> Result<isize, JoinError> {
        if pid >= MAX_PROCESSES {
            return Err(JoinError::InvalidPid);
        }

        let mut table = self.table.lock();
        while table[pid].status != ProcessStatus::Zombie {
            self.waiters.register(pid, self.threads.current_thread());
            drop(table);
            self.threads.block_current();
            table = self.table.lock();
        }

        table[pid].status = ProcessStatus::Free;
        let retval = table[pid].retval;
        kdebug!("process {pid}: joined, retval {retval}");
        Ok(retval)
    }

    /// The calling process's page table.
    ///
    /// # Panics
    ///
    /// Panics on a thread with no owning process or before `start` has
    /// built the address space.
    pub(crate) fn current_address_space(&self) -> PageTableId {
        self.with_current_entry(|entry| entry.address_space)
            .expect("process has no address space")
    }
}
