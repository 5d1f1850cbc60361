#![deny(unsafe_code)]

//! Shared test utilities for the wpactl workspace.
//!
//! Provides a scripted stand-in for the daemon, config builders, and tracing
//! helpers so that individual crate tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! wpactl-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod supplicant;
pub mod tracing_setup;

pub use config::TestConfigBuilder;
pub use supplicant::{FakeSupplicant, Reply};
