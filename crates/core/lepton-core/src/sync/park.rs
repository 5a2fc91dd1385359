//! The thread-parking seam.
//!
//! Blocking primitives suspend and resume threads of control through
//! this trait instead of talking to a scheduler directly. The contract
//! is deliberately weak — it is exactly what a sleep-then-recheck loop
//! needs and nothing more.

/// Identity of a kernel thread of control, assigned by the thread layer.
pub type ThreadId = u64;

/// Minimal park/unpark interface provided by the thread layer.
///
/// # Contract
///
/// - [`block_current`](Self::block_current) may return spuriously.
///   Every caller must re-check its wake condition in a loop; none of
///   the primitives in this crate assume a wake-up means anything.
/// - An [`unblock`](Self::unblock) delivered while the target is not
///   blocked must make the target's *next* `block_current` return
///   immediately (park-token semantics). This closes the window between
///   a waiter registering itself, releasing the lock that protects the
///   wait condition, and actually blocking.
/// - `unblock` on a thread that is not registered anywhere is harmless.
pub trait ThreadPark: Send + Sync {
    /// The calling thread's id.
    fn current_thread(&self) -> ThreadId;

    /// Suspends the calling thread until unblocked (or spuriously).
    fn block_current(&self);

    /// Wakes `thread`, or arms its next [`block_current`](Self::block_current).
    fn unblock(&self, thread: ThreadId);
}
