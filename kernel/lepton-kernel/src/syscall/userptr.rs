//! Kernel access to user memory.
//!
//! User pointers arrive as raw virtual addresses and are treated as
//! already validated — there is no copy-in/copy-out safety layer. What
//! the kernel does not tolerate is a pointer whose page is not mapped:
//! a translation fault during a kernel access has no handler and halts
//! the kernel.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use lepton_core::addr::VirtAddr;
use lepton_core::kfatal;

use crate::hal::{PageTableId, VirtualMemory};

fn fault(addr: VirtAddr) -> ! {
    kfatal!("unhandled user memory fault at {addr}");
    panic!("unhandled user memory fault at {addr}");
}

/// Reads a NUL-terminated string of at most `max` bytes from user
/// memory. Invalid UTF-8 is replaced, byte length is preserved.
pub(super) fn read_str(
    vm: &dyn VirtualMemory,
    table: PageTableId,
    va: VirtAddr,
    max: usize,
) -> String {
    let mut bytes = Vec::new();
    let mut addr = va;
    let mut byte = [0u8; 1];
    while bytes.len() < max {
        if vm.read(table, addr, &mut byte).is_err() {
            fault(addr);
        }
        if byte[0] == 0 {
            break;
        }
        bytes.push(byte[0]);
        addr = addr + 1;
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Copies `len` bytes out of user memory.
pub(super) fn read_bytes(
    vm: &dyn VirtualMemory,
    table: PageTableId,
    va: VirtAddr,
    len: usize,
) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    if vm.read(table, va, &mut bytes).is_err() {
        fault(va);
    }
    bytes
}

/// Copies `bytes` into user memory.
pub(super) fn write_bytes(vm: &dyn VirtualMemory, table: PageTableId, va: VirtAddr, bytes: &[u8]) {
    if vm.write(table, va, bytes).is_err() {
        fault(va);
    }
}
