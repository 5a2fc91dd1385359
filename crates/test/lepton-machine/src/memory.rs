//! Simulated physical memory, page tables and the translation cache.
//!
//! A bounded pool of page frames, per-process page tables mapping
//! virtual page number to (frame, writable), and a fixed-capacity
//! fast-lookup translation cache: installing a table whose resident
//! mapping count exceeds the cache is fatal, exactly as it would be on
//! the machine this models, which has no cache-miss handling.
//!
//! Kernel accesses translate through the page table and fault on
//! unmapped pages; writes additionally fault on pages whose dirty bit
//! was cleared.

use std::collections::BTreeMap;
use std::sync::Mutex;

use lepton_core::addr::{PhysAddr, VirtAddr};
use lepton_kernel::config::PAGE_SIZE;
use lepton_kernel::hal::{MapFlags, MemFault, PageTableId, VirtualMemory};

/// Mappings the translation cache can hold at once.
pub const TLB_CAPACITY: usize = 16;

/// Page frames in the physical pool.
pub const FRAME_POOL: usize = 256;

#[derive(Clone, Copy)]
struct Mapping {
    frame: usize,
    writable: bool,
}

#[derive(Default)]
struct PageTable {
    map: BTreeMap<usize, Mapping>,
}

#[derive(Default)]
struct Inner {
    frames: Vec<Box<[u8]>>,
    tables: Vec<PageTable>,
}

/// The machine's memory subsystem.
#[derive(Default)]
pub struct MachineMemory {
    inner: Mutex<Inner>,
}

impl MachineMemory {
    /// Creates an empty memory subsystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames currently allocated out of the pool.
    pub fn frames_in_use(&self) -> usize {
        self.inner.lock().unwrap().frames.len()
    }
}

impl Inner {
    fn translate(&self, table: PageTableId, va: VirtAddr, write: bool) -> Result<usize, MemFault> {
        let fault = MemFault { addr: va };
        let table = self.tables.get(table.as_usize()).ok_or(fault)?;
        let mapping = table.map.get(&(va.as_usize() / PAGE_SIZE)).ok_or(fault)?;
        if write && !mapping.writable {
            return Err(fault);
        }
        Ok(mapping.frame)
    }

    /// Runs `access` over each page-sized piece of `[va, va + len)`,
    /// handing it the frame bytes for that piece and the offset of the
    /// piece within the whole range.
    fn for_each_page(
        &mut self,
        table: PageTableId,
        va: VirtAddr,
        len: usize,
        write: bool,
        mut access: impl FnMut(&mut [u8], usize),
    ) -> Result<(), MemFault> {
        let mut done = 0;
        while done < len {
            let addr = va + done;
            let frame = self.translate(table, addr, write)?;
            let page_off = addr.as_usize() % PAGE_SIZE;
            let chunk = (PAGE_SIZE - page_off).min(len - done);
            let bytes = &mut self.frames[frame][page_off..page_off + chunk];
            access(bytes, done);
            done += chunk;
        }
        Ok(())
    }
}

impl VirtualMemory for MachineMemory {
    fn create_page_table(&self) -> PageTableId {
        let mut inner = self.inner.lock().unwrap();
        inner.tables.push(PageTable::default());
        PageTableId::new(inner.tables.len() - 1)
    }

    fn alloc_page(&self) -> Option<PhysAddr> {
        let mut inner = self.inner.lock().unwrap();
        if inner.frames.len() >= FRAME_POOL {
            return None;
        }
        inner.frames.push(vec![0u8; PAGE_SIZE].into_boxed_slice());
        Some(PhysAddr::new((inner.frames.len() - 1) * PAGE_SIZE))
    }

    fn map(&self, table: PageTableId, phys: PhysAddr, va: VirtAddr, flags: MapFlags) {
        let mut inner = self.inner.lock().unwrap();
        let entry = Mapping {
            frame: phys.as_usize() / PAGE_SIZE,
            writable: flags.contains(MapFlags::WRITABLE),
        };
        inner.tables[table.as_usize()]
            .map
            .insert(va.as_usize() / PAGE_SIZE, entry);
    }

    fn set_clean(&self, table: PageTableId, va: VirtAddr) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(mapping) = inner.tables[table.as_usize()]
            .map
            .get_mut(&(va.as_usize() / PAGE_SIZE))
        {
            mapping.writable = false;
        }
    }

    fn tlb_refresh(&self, table: PageTableId) {
        let inner = self.inner.lock().unwrap();
        let resident = inner.tables[table.as_usize()].map.len();
        assert!(
            resident <= TLB_CAPACITY,
            "translation cache overflow: {resident} mappings, capacity {TLB_CAPACITY}"
        );
    }

    fn tlb_capacity(&self) -> usize {
        TLB_CAPACITY
    }

    fn zero(&self, table: PageTableId, va: VirtAddr, len: usize) -> Result<(), MemFault> {
        let mut inner = self.inner.lock().unwrap();
        inner.for_each_page(table, va, len, true, |bytes, _| bytes.fill(0))
    }

    fn write(&self, table: PageTableId, va: VirtAddr, bytes: &[u8]) -> Result<(), MemFault> {
        let mut inner = self.inner.lock().unwrap();
        inner.for_each_page(table, va, bytes.len(), true, |chunk, off| {
            chunk.copy_from_slice(&bytes[off..off + chunk.len()]);
        })
    }

    fn read(&self, table: PageTableId, va: VirtAddr, buf: &mut [u8]) -> Result<(), MemFault> {
        let mut inner = self.inner.lock().unwrap();
        let len = buf.len();
        inner.for_each_page(table, va, len, false, |chunk, off| {
            buf[off..off + chunk.len()].copy_from_slice(chunk);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapped_page(mem: &MachineMemory, flags: MapFlags) -> (PageTableId, VirtAddr) {
        let table = mem.create_page_table();
        let phys = mem.alloc_page().unwrap();
        let va = VirtAddr::new(0x4000);
        mem.map(table, phys, va, flags);
        (table, va)
    }

    #[test]
    fn write_read_round_trip() {
        let mem = MachineMemory::new();
        let (table, va) = mapped_page(&mem, MapFlags::WRITABLE);
        mem.write(table, va + 12, b"payload").unwrap();
        let mut buf = [0u8; 7];
        mem.read(table, va + 12, &mut buf).unwrap();
        assert_eq!(&buf, b"payload");
    }

    #[test]
    fn access_spans_page_boundary() {
        let mem = MachineMemory::new();
        let table = mem.create_page_table();
        let va = VirtAddr::new(0x4000);
        for i in 0..2 {
            let phys = mem.alloc_page().unwrap();
            mem.map(table, phys, va + i * PAGE_SIZE, MapFlags::WRITABLE);
        }
        let data: Vec<u8> = (0u8..64).collect();
        let base = va + (PAGE_SIZE - 32);
        mem.write(table, base, &data).unwrap();
        let mut back = [0u8; 64];
        mem.read(table, base, &mut back).unwrap();
        assert_eq!(&back[..], &data[..]);
    }

    #[test]
    fn unmapped_access_faults() {
        let mem = MachineMemory::new();
        let table = mem.create_page_table();
        let mut buf = [0u8; 4];
        assert!(mem.read(table, VirtAddr::new(0x7000), &mut buf).is_err());
        assert!(mem.write(table, VirtAddr::new(0x7000), &buf).is_err());
    }

    #[test]
    fn clean_page_rejects_writes_but_reads() {
        let mem = MachineMemory::new();
        let (table, va) = mapped_page(&mem, MapFlags::WRITABLE);
        mem.write(table, va, b"code").unwrap();
        mem.set_clean(table, va);
        assert!(mem.write(table, va, b"oops").is_err());
        let mut buf = [0u8; 4];
        mem.read(table, va, &mut buf).unwrap();
        assert_eq!(&buf, b"code");
    }

    #[test]
    #[should_panic(expected = "translation cache overflow")]
    fn overfull_table_cannot_install() {
        let mem = MachineMemory::new();
        let table = mem.create_page_table();
        for i in 0..=TLB_CAPACITY {
            let phys = mem.alloc_page().unwrap();
            mem.map(table, phys, VirtAddr::new(i * PAGE_SIZE), MapFlags::WRITABLE);
        }
        mem.tlb_refresh(table);
    }

    #[test]
    fn pool_exhausts() {
        let mem = MachineMemory::new();
        for _ in 0..FRAME_POOL {
            assert!(mem.alloc_page().is_some());
        }
        assert!(mem.alloc_page().is_none());
    }
}
