//! 48-bit hardware (MAC) addresses as reported by the daemon.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// A 48-bit IEEE 802 MAC address, e.g. a BSSID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HardwareAddr([u8; 6]);

/// Error returned when a string is not a valid hardware address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hardware address {0:?}")]
pub struct AddrParseError(String);

impl HardwareAddr {
    /// Build an address from its six octets.
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// The six octets of this address.
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for HardwareAddr {
    type Err = AddrParseError;

    /// Parse six two-digit hex groups separated by `:` or `-`.
    ///
    /// Mixed separators are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AddrParseError(s.to_string());

        let separator = match s.as_bytes().get(2) {
            Some(b':') => ':',
            Some(b'-') => '-',
            _ => return Err(invalid()),
        };

        let mut octets = [0u8; 6];
        let mut groups = s.split(separator);
        for octet in &mut octets {
            let group = groups.next().ok_or_else(invalid)?;
            if group.len() != 2 || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(group, 16).map_err(|_| invalid())?;
        }
        if groups.next().is_some() {
            return Err(invalid());
        }

        Ok(Self(octets))
    }
}

impl fmt::Display for HardwareAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl Serialize for HardwareAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_colon_separated() {
        let addr: HardwareAddr = "00:11:22:33:44:55".parse().unwrap();
        assert_eq!(addr.octets(), [0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    }

    #[test]
    fn test_parse_hyphen_separated_and_uppercase() {
        let addr: HardwareAddr = "AA-BB-CC-DD-EE-FF".parse().unwrap();
        assert_eq!(addr.octets(), [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    }

    #[test]
    fn test_display_is_lowercase_colon_form() {
        let addr = HardwareAddr::new([0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]);
        assert_eq!(addr.to_string(), "de:ad:be:ef:00:01");
    }

    #[test]
    fn test_rejects_malformed_addresses() {
        for input in [
            "",
            "any",
            "00:11:22:33:44",
            "00:11:22:33:44:55:66",
            "00:11:22-33:44:55",
            "0:11:22:33:44:55",
            "00:11:22:33:44:5g",
            "+0:11:22:33:44:55",
            "00:11:22:33:44:55:",
        ] {
            assert!(input.parse::<HardwareAddr>().is_err(), "{input:?} parsed");
        }
    }

    #[test]
    fn test_serializes_as_string() {
        let addr = HardwareAddr::new([0, 1, 2, 3, 4, 5]);
        assert_eq!(
            serde_json::to_string(&addr).unwrap(),
            "\"00:01:02:03:04:05\""
        );
    }
}
