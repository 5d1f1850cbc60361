//! Tracing initialisation helpers for tests.
//!
//! Call [`init_test_tracing`] at the top of any test that wants the
//! connection's tracing events captured by the test harness.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset: connection internals at debug,
/// everything else at info.
const DEFAULT_TEST_FILTER: &str = "info,wpactl_core=debug";

/// Initialise a subscriber writing to the test-harness writer.
///
/// Respects `RUST_LOG`. Safe to call from every test; only the first call
/// in a process installs the subscriber.
///
/// # Example
///
/// ```ignore
/// #[tokio::test]
/// async fn my_test() {
///     wpactl_test_utils::tracing_setup::init_test_tracing();
///     tracing::debug!(target: "wpactl_core", "visible by default");
/// }
/// ```
pub fn init_test_tracing() {
    init_test_tracing_with(DEFAULT_TEST_FILTER);
}

/// Like [`init_test_tracing`], with an explicit fallback filter.
pub fn init_test_tracing_with(fallback: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_test_writer()
        .try_init();
}
