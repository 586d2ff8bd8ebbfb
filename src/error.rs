//! Pool construction errors.

use std::io;
use thiserror::Error;

/// Errors surfaced when building a pool.
///
/// Submission misuse (queuing into a pool that is shutting down) is a
/// programmer error and panics instead; task panics are reported through
/// [`TaskOutcome`](crate::TaskOutcome), not here.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The OS rejected spawning a worker thread.
    ///
    /// Workers spawned before the failure have already been shut down and
    /// joined by the time this is returned.
    #[error("failed to spawn worker thread {index}: {source}")]
    Spawn {
        /// Index of the worker that could not be spawned.
        index: usize,
        /// The underlying spawn error.
        source: io::Error,
    },
}
