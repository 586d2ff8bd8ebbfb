//! Shared helpers for the crate's tests.

use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Installs a trace-level subscriber once per process.
///
/// No-op unless the `tracing-integration` feature is enabled, so tests
/// can call it unconditionally.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        #[cfg(feature = "tracing-integration")]
        {
            let _ = tracing_subscriber::fmt()
                .with_max_level(tracing::Level::TRACE)
                .with_test_writer()
                .try_init();
        }
    });
}
