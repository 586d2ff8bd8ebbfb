//! Logging shim over the optional `tracing` dependency.
//!
//! With the `tracing-integration` feature enabled this re-exports the
//! `tracing` event macros; without it, the same names expand to nothing,
//! so call sites stay unconditional and cost nothing when logging is off.
//!
//! The pool only emits events (worker lifecycle, submission, shutdown);
//! there is no span machinery here.

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, error, trace, warn};

#[cfg(not(feature = "tracing-integration"))]
mod noop {
    /// No-op trace-level event macro.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// No-op debug-level event macro.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    /// No-op warn-level event macro.
    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {};
    }

    /// No-op error-level event macro.
    #[macro_export]
    macro_rules! error {
        ($($arg:tt)*) => {};
    }

    pub use crate::{debug, error, trace, warn};
}

#[cfg(not(feature = "tracing-integration"))]
pub use noop::*;
