//! Thread-count policy consumed by the pool.
//!
//! The pool does not decide how many workers to run; a [`PoolStrategy`]
//! does. The strategy also gets a per-worker hook that runs inside each
//! worker thread before its first task, for self-configuration such as
//! affinity pinning.

use std::num::NonZeroUsize;
use std::thread;

/// Policy object supplying the worker count and per-worker setup.
///
/// Implementations are shared across all workers, so they must be
/// `Send + Sync`.
pub trait PoolStrategy: Send + Sync {
    /// Number of workers the pool should run.
    ///
    /// A result of zero is treated as one by the pool.
    fn compute_thread_count(&self) -> usize;

    /// Per-worker setup hook.
    ///
    /// Called once per worker, from inside the worker thread, before it
    /// picks up its first task. `worker_index` is in `0..N`. The default
    /// does nothing.
    fn apply_thread_strategy(&self, worker_index: usize) {
        let _ = worker_index;
    }
}

/// Strategy with an explicit worker count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedConcurrency(pub usize);

impl PoolStrategy for FixedConcurrency {
    fn compute_thread_count(&self) -> usize {
        self.0
    }
}

/// Strategy matching the host's available parallelism.
///
/// Falls back to one worker when parallelism cannot be queried.
#[derive(Debug, Clone, Copy, Default)]
pub struct HardwareConcurrency;

impl PoolStrategy for HardwareConcurrency {
    fn compute_thread_count(&self) -> usize {
        thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    }
}
