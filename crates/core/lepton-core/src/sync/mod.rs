//! Synchronization primitives.
//!
//! [`IrqSpinLock`] is the single locking discipline for kernel tables:
//! interrupts off, then a spin lock, released in the opposite order by
//! an RAII guard. [`ThreadPark`] is the seam to the thread layer that
//! the blocking primitives ([`Semaphore`], the process wait-set) build
//! on.

pub mod interrupt;

mod irq_spinlock;
mod park;
mod semaphore;

pub use irq_spinlock::{IrqSpinLock, IrqSpinLockGuard};
pub use park::{ThreadId, ThreadPark};
pub use semaphore::Semaphore;
