//! Typed records decoded from daemon responses and notifications.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::hwaddr::HardwareAddr;

/// A network name as raw bytes.
///
/// SSIDs are arbitrary octet strings; they are usually, but not always,
/// valid UTF-8.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Ssid(Vec<u8>);

impl Ssid {
    /// The raw SSID bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The SSID as text, replacing invalid UTF-8 sequences.
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    /// Whether the SSID is empty (hidden networks report no name).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Ssid {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for Ssid {
    fn from(name: &str) -> Self {
        Self(name.as_bytes().to_vec())
    }
}

impl PartialEq<str> for Ssid {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<&str> for Ssid {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl fmt::Display for Ssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.to_string_lossy())
    }
}

impl Serialize for Ssid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string_lossy())
    }
}

/// One access point from `SCAN_RESULTS`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    /// Hardware address of the access point.
    pub bssid: Option<HardwareAddr>,
    /// Channel frequency in MHz.
    pub frequency: i32,
    /// Signal level as reported by the daemon (dBm for most drivers).
    pub signal_level: i32,
    /// Capability flags, e.g. `WPA2-PSK-CCMP` or `ESS`.
    pub flags: Vec<String>,
    pub ssid: Ssid,
}

/// One stored network profile from `LIST_NETWORKS`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfiguredNetwork {
    /// Network id as reported; ids are not necessarily contiguous.
    pub id: u32,
    pub ssid: Ssid,
    /// `None` when the profile is not pinned to a BSSID.
    pub bssid: Option<HardwareAddr>,
    /// Flags such as `CURRENT` or `DISABLED`.
    pub flags: Vec<String>,
}

impl ConfiguredNetwork {
    /// Whether the daemon marks this network as the active one.
    pub fn is_current(&self) -> bool {
        self.flags.iter().any(|flag| flag == "CURRENT")
    }
}

/// Association state from `STATUS`. Fields the daemon omitted stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusResult {
    /// e.g. `COMPLETED`, `SCANNING`, `DISCONNECTED`.
    pub wpa_state: Option<String>,
    pub key_mgmt: Option<String>,
    pub ip_address: Option<String>,
    pub ssid: Option<Ssid>,
    /// Local interface address.
    pub address: Option<HardwareAddr>,
    /// Address of the associated access point.
    pub bssid: Option<HardwareAddr>,
    /// Frequency in MHz.
    pub frequency: Option<i32>,
    pub id_str: Option<String>,
}

/// An unsolicited notification from the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WpaEvent {
    /// `CONNECTED`, `DISCONNECTED`, `BAD-PASSPHRASE`, ... or `MESSAGE` for
    /// lines that are not `CTRL-` events.
    pub name: String,
    /// The payload exactly as received (minus the priority tag).
    pub line: String,
    /// Priority from the `<P>` tag, 0 (most verbose) to 4.
    pub priority: u8,
    /// `key=value` tokens of the payload.
    pub arguments: BTreeMap<String, String>,
}

impl WpaEvent {
    /// Name given to notifications that are not `CTRL-` events.
    pub const MESSAGE: &'static str = "MESSAGE";

    /// Name given to disconnects caused by a wrong pre-shared key.
    pub const BAD_PASSPHRASE: &'static str = "BAD-PASSPHRASE";

    /// Look up a `key=value` argument.
    pub fn argument(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).map(String::as_str)
    }
}
