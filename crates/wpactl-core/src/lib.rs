#![deny(unsafe_code)]

//! wpactl core: a client for the wpa_supplicant control interface.
//!
//! The daemon speaks a line-oriented text protocol over an `AF_UNIX`
//! datagram socket. This crate provides the [`Connection`] engine that keeps
//! command replies and unsolicited notifications apart, typed wrappers for
//! the control commands, and parsers for the daemon's response formats.

/// Wire codec: priority tags and escaped string literals.
pub mod codec;
/// The control connection, its background tasks, and command wrappers.
pub mod ctrl;
/// Connection and parse errors.
pub mod error;
/// Hardware (MAC) addresses.
pub mod hwaddr;
/// Parsers for tabular and `key=value` responses.
pub mod parse;
/// Typed records decoded from responses and events.
pub mod types;

pub use ctrl::{Connection, EventStream, decode_event};
pub use error::{ControlError, ParseError};
pub use hwaddr::{AddrParseError, HardwareAddr};
pub use types::{ConfiguredNetwork, ScanResult, Ssid, StatusResult, WpaEvent};
pub use wpactl_config::ControlConfig;
