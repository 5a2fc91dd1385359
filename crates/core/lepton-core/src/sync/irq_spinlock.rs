//! Interrupt-safe spin lock.
//!
//! Masks interrupts through the registered [`interrupt`] hooks before
//! acquiring the inner spin lock, and restores the saved state after
//! releasing it. On a kernel where a timer or device interrupt can
//! re-enter the scheduler mid-update, both halves are required; the
//! strict nesting (disable, acquire … release, restore) is enforced by
//! the guard's drop order, so every exit path — early returns included —
//! unwinds the pair correctly.

use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

use super::interrupt::{self, IntrState};

/// A spin lock that holds interrupts off while locked.
pub struct IrqSpinLock<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

// SAFETY: the atomic flag ensures exclusive access to the data; `T: Send`
// because the data may be accessed from different threads of control.
unsafe impl<T: Send> Send for IrqSpinLock<T> {}
unsafe impl<T: Send> Sync for IrqSpinLock<T> {}

impl<T> IrqSpinLock<T> {
    /// Creates a new unlocked lock. Const so it can live in statics.
    pub const fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(value),
        }
    }

    /// Disables interrupts and acquires the lock, spinning until it is
    /// available. Test-and-test-and-set to keep contention off the
    /// cache line.
    pub fn lock(&self) -> IrqSpinLockGuard<'_, T> {
        let saved = interrupt::disable();
        loop {
            if self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return IrqSpinLockGuard {
                    lock: self,
                    saved,
                    _not_send: PhantomData,
                };
            }
            while self.locked.load(Ordering::Relaxed) {
                core::hint::spin_loop();
            }
        }
    }

    /// Attempts to acquire without spinning. Restores the interrupt
    /// state immediately when the lock is already held.
    pub fn try_lock(&self) -> Option<IrqSpinLockGuard<'_, T>> {
        let saved = interrupt::disable();
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(IrqSpinLockGuard {
                lock: self,
                saved,
                _not_send: PhantomData,
            })
        } else {
            interrupt::restore(saved);
            None
        }
    }
}

/// RAII guard: releases the lock, then restores the interrupt state.
///
/// Not `Send` — the saved interrupt state belongs to the CPU the lock
/// was taken on.
pub struct IrqSpinLockGuard<'a, T> {
    lock: &'a IrqSpinLock<T>,
    saved: IntrState,
    _not_send: PhantomData<*const ()>,
}

impl<T> Deref for IrqSpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the lock is held, giving exclusive access.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for IrqSpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the lock is held, giving exclusive access.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for IrqSpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
        interrupt::restore(self.saved);
    }
}
