//! Interrupt-state control hooks.
//!
//! The kernel core never touches interrupt hardware directly; a port
//! registers a disable/restore pair here and [`super::IrqSpinLock`]
//! brackets every critical section with them. The default hooks are
//! no-ops, which is also the correct behavior for the hosted machine,
//! where the spin lock alone makes critical sections atomic.

use core::sync::atomic::{AtomicPtr, Ordering};

/// Opaque saved interrupt state, returned by the disable hook and passed
/// back to the restore hook.
pub type IntrState = usize;

/// Signature of the disable hook: mask interrupts, return the prior
/// state.
pub type DisableFn = fn() -> IntrState;

/// Signature of the restore hook: restore a previously saved state.
pub type RestoreFn = fn(IntrState);

fn null_disable() -> IntrState {
    0
}

fn null_restore(_state: IntrState) {}

static DISABLE: AtomicPtr<()> = AtomicPtr::new(null_disable as *mut ());
static RESTORE: AtomicPtr<()> = AtomicPtr::new(null_restore as *mut ());

/// Registers the interrupt control pair. Called once by a port before
/// any lock is taken.
pub fn set_interrupt_ops(disable: DisableFn, restore: RestoreFn) {
    DISABLE.store(disable as *mut (), Ordering::Release);
    RESTORE.store(restore as *mut (), Ordering::Release);
}

/// Masks interrupts and returns the prior state.
#[inline]
pub fn disable() -> IntrState {
    let ptr = DISABLE.load(Ordering::Acquire);
    // SAFETY: only valid `DisableFn` pointers are ever stored.
    let f: DisableFn = unsafe { core::mem::transmute(ptr) };
    f()
}

/// Restores a previously saved interrupt state.
#[inline]
pub fn restore(state: IntrState) {
    let ptr = RESTORE.load(Ordering::Acquire);
    // SAFETY: only valid `RestoreFn` pointers are ever stored.
    let f: RestoreFn = unsafe { core::mem::transmute(ptr) };
    f(state);
}
