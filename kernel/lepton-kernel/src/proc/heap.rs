//! Heap growth for the calling process.
//!
//! The MemLimit operation: a query returns the recorded heap end, a
//! growth request maps fresh pages up to the new end, and the heap
//! never shrinks. Always invoked by the owning process's own thread, so
//! the slot's heap accounting races with nothing.

use lepton_core::addr::VirtAddr;
use lepton_core::kdebug;

use crate::config::PAGE_SIZE;
use crate::hal::MapFlags;
use crate::proc::ProcessManager;

impl ProcessManager {
    /// Queries or raises the calling process's heap end.
    ///
    /// - `None` asks for the current heap end; nothing is mutated.
    /// - A request below the current heap end is rejected with `None`
    ///   and leaves the heap unchanged — the heap only grows.
    /// - Otherwise one physical page per page-granule between the old
    ///   and new heap end is allocated and mapped, the translation
    ///   cache is reinstalled, and the new heap end is recorded and
    ///   returned.
    ///
    /// # Panics
    ///
    /// Panics on a thread with no owning process, and when the physical
    /// page pool is exhausted mid-growth — resource-invariant
    /// violations are fatal in this kernel, not returned.
    pub fn mem_limit(&self, requested: Option<VirtAddr>) -> Option<VirtAddr> {
        let pid = self
            .threads
            .owning_process()
            .expect("mem_limit: thread has no owning process");

        let mut table = self.table.lock();
        let current = table[pid].heap_end;

        let Some(new_end) = requested else {
            return Some(current);
        };

        if new_end < current {
            kdebug!("process {pid}: rejected heap shrink {new_end} < {current}");
            return None;
        }

        let page_table = table[pid]
            .address_space
            .expect("mem_limit: process has no address space");

        // Pages covering [current, new_end) that are not mapped yet.
        let mut va = current.align_up(PAGE_SIZE);
        let top = new_end.align_up(PAGE_SIZE);
        let grew = va < top;
        while va < top {
            let phys = self
                .vm
                .alloc_page()
                .expect("mem_limit: out of physical pages");
            self.vm.map(page_table, phys, va, MapFlags::WRITABLE);
            va = va + PAGE_SIZE;
        }
        if grew {
            self.vm.tlb_refresh(page_table);
        }

        table[pid].heap_end = new_end;
        kdebug!("process {pid}: heap end {current} -> {new_end}");
        Some(new_end)
    }
}
