//! Console and file syscall handlers.
//!
//! File handles 0–2 are the console triad and go to the character
//! device; handles ≥ 3 reach the file layer as `handle − 3`. A negative
//! handle on read or write is a kernel-fatal error — this teaching I/O
//! layer has no error path for it, deliberately.

use alloc::vec;

use lepton_core::addr::VirtAddr;
use lepton_core::kfatal;
use lepton_syscall::{FD_FILE_BASE, FD_STDERR, FD_STDIN, FS_ERROR, FS_OK};

use crate::config::{FILE_NAME_MAX, PATH_MAX};

use super::{SyscallDispatcher, userptr};

impl SyscallDispatcher {
    /// `Read(fd, buf, len)` — console or file read into user memory.
    pub(super) fn sys_read(&self, fd: isize, buf: VirtAddr, len: usize) -> isize {
        let mut data = vec![0u8; len];
        let count = if (FD_STDIN..=FD_STDERR).contains(&fd) {
            self.console.read(&mut data)
        } else if fd >= FD_FILE_BASE {
            self.fs.read(fd - FD_FILE_BASE, &mut data)
        } else {
            kfatal!("read: unsupported file handle {fd}");
            panic!("read: unsupported file handle {fd}");
        };
        if count > 0 {
            let table = self.process.current_address_space();
            userptr::write_bytes(&*self.vm, table, buf, &data[..count as usize]);
        }
        count
    }

    /// `Write(fd, buf, len)` — console or file write from user memory.
    pub(super) fn sys_write(&self, fd: isize, buf: VirtAddr, len: usize) -> isize {
        let table = self.process.current_address_space();
        let data = userptr::read_bytes(&*self.vm, table, buf, len);
        if (FD_STDIN..=FD_STDERR).contains(&fd) {
            self.console.write(&data)
        } else if fd >= FD_FILE_BASE {
            self.fs.write(fd - FD_FILE_BASE, &data)
        } else {
            kfatal!("write: unsupported file handle {fd}");
            panic!("write: unsupported file handle {fd}");
        }
    }

    /// `Open(path)` — file-layer open. Successful handles move up by 3
    /// into user-visible space; negative errors pass through unchanged.
    pub(super) fn sys_open(&self, path: VirtAddr) -> isize {
        let table = self.process.current_address_space();
        let path = userptr::read_str(&*self.vm, table, path, PATH_MAX);
        let handle = self.fs.open(&path);
        if handle < 0 { handle } else { handle + FD_FILE_BASE }
    }

    /// `Close(handle)` — file-layer close. The console triad cannot be
    /// closed.
    pub(super) fn sys_close(&self, handle: isize) -> isize {
        if handle < FD_FILE_BASE {
            return FS_ERROR;
        }
        self.fs.close(handle - FD_FILE_BASE)
    }

    /// `Seek(handle, offset)` — file-layer reposition.
    pub(super) fn sys_seek(&self, handle: isize, offset: usize) -> isize {
        if handle < FD_FILE_BASE {
            return FS_ERROR;
        }
        self.fs.seek(handle - FD_FILE_BASE, offset)
    }

    /// `Create(path, size)` — file-layer create.
    pub(super) fn sys_create(&self, path: VirtAddr, size: usize) -> isize {
        let table = self.process.current_address_space();
        let path = userptr::read_str(&*self.vm, table, path, PATH_MAX);
        self.fs.create(&path, size)
    }

    /// `Delete(path)` — file-layer remove.
    pub(super) fn sys_delete(&self, path: VirtAddr) -> isize {
        let table = self.process.current_address_space();
        let path = userptr::read_str(&*self.vm, table, path, PATH_MAX);
        self.fs.remove(&path)
    }

    /// `FileCount(volume)` — number of files on the named volume.
    pub(super) fn sys_filecount(&self, volume: VirtAddr) -> isize {
        let table = self.process.current_address_space();
        let volume = userptr::read_str(&*self.vm, table, volume, PATH_MAX);
        self.fs.file_count(&volume)
    }

    /// `File(volume, index, out)` — copies the NUL-terminated name of
    /// the n-th file on the volume into the user buffer, which must
    /// hold [`FILE_NAME_MAX`] bytes.
    pub(super) fn sys_file(&self, volume: VirtAddr, index: usize, out: VirtAddr) -> isize {
        let table = self.process.current_address_space();
        let volume = userptr::read_str(&*self.vm, table, volume, PATH_MAX);
        let mut name = [0u8; FILE_NAME_MAX];
        let status = self.fs.file_name(&volume, index, &mut name);
        if status == FS_OK {
            userptr::write_bytes(&*self.vm, table, out, &name);
        }
        status
    }
}
