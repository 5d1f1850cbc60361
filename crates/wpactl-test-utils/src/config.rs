//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create [`ControlConfig`] values with short
//! timeouts and temporary socket directories.

use std::path::Path;
use std::time::Duration;

use wpactl_config::ControlConfig;

/// Fluent builder for [`ControlConfig`] in tests.
///
/// Starts from the production defaults but with timeouts short enough for
/// a test suite (2 s per command, 1 s per task on shutdown).
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .socket_dir(dir.path())
///     .command_timeout(Duration::from_millis(200))
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: ControlConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ControlConfig {
                command_timeout_ms: 2_000,
                shutdown_timeout_ms: 1_000,
                ..ControlConfig::default()
            },
        }
    }

    /// Directory holding the daemon sockets.
    pub fn socket_dir(mut self, dir: &Path) -> Self {
        self.config.socket_dir = dir.to_path_buf();
        self
    }

    /// Directory for the client's own socket.
    pub fn client_dir(mut self, dir: &Path) -> Self {
        self.config.client_dir = dir.to_path_buf();
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn attach_events(mut self, attach: bool) -> Self {
        self.config.attach_events = attach;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn build(self) -> ControlConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn duration_ms(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX).max(1)
}
