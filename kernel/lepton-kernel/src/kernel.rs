//! Kernel assembly: boot-time construction and wiring.

use alloc::sync::Arc;

use lepton_core::kinfo;
use lepton_core::sync::ThreadPark;

use crate::hal::{CharConsole, FileSystem, ImageLoader, ThreadControl, VirtualMemory};
use crate::proc::ProcessManager;
use crate::sem::SemaphoreRegistry;
use crate::syscall::{SyscallDispatcher, UserContext};

/// The machine-dependent collaborators a port supplies to boot the
/// kernel. `threads` and `park` are usually the same object, named
/// twice for the two seams it serves.
pub struct Platform {
    /// Thread creation, binding and mode transfers.
    pub threads: Arc<dyn ThreadControl>,
    /// Thread parking, for the blocking primitives.
    pub park: Arc<dyn ThreadPark>,
    /// Virtual memory and the translation cache.
    pub vm: Arc<dyn VirtualMemory>,
    /// The console character device.
    pub console: Arc<dyn CharConsole>,
    /// The file-system layer.
    pub fs: Arc<dyn FileSystem>,
    /// The executable-image parser.
    pub loader: Arc<dyn ImageLoader>,
}

/// The assembled kernel core: process table, semaphore registry and
/// syscall dispatcher, wired to one platform.
///
/// Constructed once at boot, before any user process runs, and never
/// torn down.
pub struct Kernel {
    /// Process table and lifecycle controller.
    pub process: Arc<ProcessManager>,
    /// Named user semaphores.
    pub semaphores: Arc<SemaphoreRegistry>,
    dispatcher: SyscallDispatcher,
}

impl Kernel {
    /// Initializes the kernel tables and wires the dispatcher.
    pub fn new(platform: Platform) -> Arc<Self> {
        let Platform {
            threads,
            park,
            vm,
            console,
            fs,
            loader,
        } = platform;

        let process = ProcessManager::new(
            threads.clone(),
            park.clone(),
            vm.clone(),
            fs.clone(),
            loader,
        );
        let semaphores = SemaphoreRegistry::new(park);
        let dispatcher = SyscallDispatcher::new(
            process.clone(),
            semaphores.clone(),
            threads,
            vm,
            console,
            fs,
        );

        kinfo!("kernel tables initialized");

        Arc::new(Self {
            process,
            semaphores,
            dispatcher,
        })
    }

    /// Handles one trapped system call against this kernel's tables.
    pub fn handle_syscall(&self, context: &mut UserContext) {
        self.dispatcher.handle(context);
    }
}
