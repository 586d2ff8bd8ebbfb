//! Drainpool: a fixed-size worker pool with quiescence tracking.
//!
//! # Overview
//!
//! Drainpool executes opaque, zero-argument tasks on a fixed set of worker
//! threads. Every submitted task runs exactly once on exactly one worker,
//! and a caller can block until the pool is *quiescent*: the queue is empty
//! and no task is in flight. Shutdown drains the queue before joining the
//! workers, so work accepted before shutdown always runs.
//!
//! # Core Guarantees
//!
//! - **Exactly once**: each task is executed by exactly one worker
//! - **FIFO dispatch**: tasks are dequeued in submission order
//! - **Quiescence**: [`WorkerPool::wait`] returns only when the queue is
//!   empty and nothing is in flight
//! - **Drain-on-shutdown**: tasks queued before shutdown run to completion
//!   before the workers exit
//! - **Panic isolation**: a panicking task resolves its handle with the
//!   captured payload and never takes a worker down
//!
//! # Module Structure
//!
//! - [`pool`]: the threaded engine (`WorkerPool`, `PoolHandle`)
//! - [`sequential`]: the threads-disabled engine with the same contract
//! - [`task`]: completion handles ([`TaskHandle`])
//! - [`outcome`]: how a finished task reports ([`TaskOutcome`])
//! - [`strategy`]: thread-count policy ([`PoolStrategy`])
//! - [`error`]: construction errors
//!
//! # Example
//!
//! ```
//! use drainpool::{FixedConcurrency, WorkerPool};
//!
//! let pool = WorkerPool::new(FixedConcurrency(4)).expect("spawn workers");
//! let handle = pool.submit(|| {
//!     // some unit of work
//! });
//! pool.wait();
//! assert!(handle.is_ready());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod outcome;
#[cfg(feature = "threads")]
pub mod pool;
pub mod sequential;
#[cfg(feature = "threads")]
mod stack;
pub mod strategy;
pub mod task;
pub mod test_utils;
pub mod tracing_compat;

pub use error::PoolError;
pub use outcome::{PanicPayload, TaskOutcome};
#[cfg(feature = "threads")]
pub use pool::{PoolHandle, PoolOptions, WorkerPool};
pub use sequential::SequentialPool;
#[cfg(feature = "threads")]
pub use stack::DEFAULT_WORKER_STACK;
pub use strategy::{FixedConcurrency, HardwareConcurrency, PoolStrategy};
pub use task::TaskHandle;

/// The engine selected by the `threads` feature.
///
/// With the feature enabled (the default) this is [`WorkerPool`]; without
/// it, the [`SequentialPool`] fallback.
#[cfg(feature = "threads")]
pub type DefaultPool = WorkerPool;

/// The engine selected by the `threads` feature.
#[cfg(not(feature = "threads"))]
pub type DefaultPool = SequentialPool;
