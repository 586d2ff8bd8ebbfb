//! Stack-size hand-off for worker spawns.
//!
//! Stack size is an attribute of thread creation, not of a running thread,
//! so the facade cannot set it after the fact. The constructor writes the
//! desired size into a per-thread slot immediately before each spawn; the
//! spawn path consumes the slot and applies it to the `thread::Builder`.
//!
//! Slot contract: read-then-reset, consumed exactly once per spawn. Zero
//! means platform default.

use std::cell::Cell;
use std::io;
use std::thread::{self, JoinHandle};

/// Default stack size requested for each worker: 8 MiB.
pub const DEFAULT_WORKER_STACK: usize = 8 * 1024 * 1024;

/// Floor for non-zero requests, matching the platform's minimum thread
/// stack (`PTHREAD_STACK_MIN` on Linux).
pub(crate) const MIN_WORKER_STACK: usize = 16 * 1024;

thread_local! {
    /// Stack size for the next spawn issued from this thread.
    static PENDING_STACK_SIZE: Cell<usize> = const { Cell::new(0) };
}

/// Requests `bytes` of stack for the next worker spawned from this thread.
pub(crate) fn request_stack_size(bytes: usize) {
    PENDING_STACK_SIZE.with(|slot| slot.set(bytes));
}

/// Consumes the pending request, leaving the slot cleared.
pub(crate) fn take_stack_size() -> usize {
    PENDING_STACK_SIZE.with(|slot| slot.replace(0))
}

/// Spawns a named worker thread, honoring the pending stack-size request.
///
/// A non-zero request is clamped up to [`MIN_WORKER_STACK`]; zero leaves
/// the platform default in place.
pub(crate) fn spawn_worker<F>(name: String, f: F) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let mut builder = thread::Builder::new().name(name);
    let requested = take_stack_size();
    if requested != 0 {
        builder = builder.stack_size(requested.max(MIN_WORKER_STACK));
    }
    builder.spawn(f)
}
