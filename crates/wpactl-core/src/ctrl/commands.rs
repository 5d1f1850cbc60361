//! Typed wrappers for the daemon's control commands.

use zeroize::Zeroizing;

use super::connection::{Connection, command_label};
use crate::codec::{decode_byte_literal, trim_reply};
use crate::error::{ControlError, ParseError};
use crate::parse::{parse_list_networks, parse_scan_results, parse_status};
use crate::types::{ConfiguredNetwork, ScanResult, StatusResult};

/// `SET_NETWORK` variables whose values are sent bare instead of quoted.
const UNQUOTED_VARIABLES: [&str; 4] = ["key_mgmt", "priority", "eap", "scan_ssid"];

/// Map a bare `FAIL` reply to [`ControlError::Failure`].
fn reject_failure(command: &str, reply: Vec<u8>) -> Result<Vec<u8>, ControlError> {
    if trim_reply(&reply) == b"FAIL" {
        return Err(ControlError::Failure {
            command: command_label(command),
        });
    }
    Ok(reply)
}

impl Connection {
    /// Check that the daemon is responsive (`PING` → `PONG`).
    pub async fn ping(&self) -> Result<(), ControlError> {
        let reply = self.execute("PING").await?;
        if trim_reply(&reply) == b"PONG" {
            Ok(())
        } else {
            Err(ParseError::new(String::from_utf8_lossy(&reply)).into())
        }
    }

    /// Request a new scan. Results arrive later; watch for
    /// `CTRL-EVENT-SCAN-RESULTS` on the event stream.
    pub async fn scan(&self) -> Result<(), ControlError> {
        self.run("SCAN").await
    }

    /// Fetch the latest scan results.
    ///
    /// Rows that fail to parse are returned as errors next to the rows that
    /// did parse.
    pub async fn scan_results(&self) -> Result<(Vec<ScanResult>, Vec<ParseError>), ControlError> {
        let reply = reject_failure("SCAN_RESULTS", self.execute("SCAN_RESULTS").await?)?;
        Ok(parse_scan_results(&reply))
    }

    /// Current association state.
    pub async fn status(&self) -> Result<StatusResult, ControlError> {
        let reply = reject_failure("STATUS", self.execute("STATUS").await?)?;
        Ok(parse_status(&reply)?)
    }

    /// Stored network profiles, with per-row errors for malformed rows.
    pub async fn list_networks(
        &self,
    ) -> Result<(Vec<ConfiguredNetwork>, Vec<ParseError>), ControlError> {
        let reply = reject_failure("LIST_NETWORKS", self.execute("LIST_NETWORKS").await?)?;
        Ok(parse_list_networks(&reply))
    }

    /// Create an empty network profile and return its id.
    pub async fn add_network(&self) -> Result<u32, ControlError> {
        let reply = reject_failure("ADD_NETWORK", self.execute("ADD_NETWORK").await?)?;
        let text = String::from_utf8_lossy(trim_reply(&reply));
        text.trim()
            .parse()
            .map_err(|e| ParseError::with_source(&*text, e).into())
    }

    /// Enable network `id`.
    pub async fn enable_network(&self, id: u32) -> Result<(), ControlError> {
        self.run(&format!("ENABLE_NETWORK {id}")).await
    }

    /// Enable every configured network.
    pub async fn enable_all_networks(&self) -> Result<(), ControlError> {
        self.run("ENABLE_NETWORK all").await
    }

    /// Select `id` and disable every other network.
    pub async fn select_network(&self, id: u32) -> Result<(), ControlError> {
        self.run(&format!("SELECT_NETWORK {id}")).await
    }

    /// Disable network `id`.
    pub async fn disable_network(&self, id: u32) -> Result<(), ControlError> {
        self.run(&format!("DISABLE_NETWORK {id}")).await
    }

    /// Disable every configured network.
    pub async fn disable_all_networks(&self) -> Result<(), ControlError> {
        self.run("DISABLE_NETWORK all").await
    }

    /// Delete network `id` from the running configuration.
    pub async fn remove_network(&self, id: u32) -> Result<(), ControlError> {
        self.run(&format!("REMOVE_NETWORK {id}")).await
    }

    /// Delete every configured network.
    pub async fn remove_all_networks(&self) -> Result<(), ControlError> {
        self.run("REMOVE_NETWORK all").await
    }

    /// Set a variable of network `id`.
    ///
    /// `value` is wrapped in double quotes unless `variable` is one of
    /// `key_mgmt`, `priority`, `eap` or `scan_ssid`. The command buffer is
    /// zeroed after sending since `psk` values travel through it.
    pub async fn set_network(&self, id: u32, variable: &str, value: &str) -> Result<(), ControlError> {
        let command = Zeroizing::new(if UNQUOTED_VARIABLES.contains(&variable) {
            format!("SET_NETWORK {id} {variable} {value}")
        } else {
            format!("SET_NETWORK {id} {variable} \"{value}\"")
        });
        self.run(command.as_str()).await
    }

    /// Read a variable of network `id`.
    ///
    /// The value comes back as bytes: `ssid` values are decoded from the
    /// daemon's escaped form and need not be valid UTF-8.
    pub async fn get_network(&self, id: u32, variable: &str) -> Result<Vec<u8>, ControlError> {
        let command = format!("GET_NETWORK {id} {variable}");
        let reply = reject_failure(&command, self.execute(&command).await?)?;
        let value = trim_reply(&reply);
        if variable == "ssid" {
            Ok(decode_byte_literal(value))
        } else {
            Ok(value.to_vec())
        }
    }

    /// Write the running configuration back to the daemon's config file.
    pub async fn save_config(&self) -> Result<(), ControlError> {
        self.run("SAVE_CONFIG").await
    }

    /// Make the daemon re-read its configuration file.
    pub async fn reconfigure(&self) -> Result<(), ControlError> {
        self.run("RECONFIGURE").await
    }

    /// Force a reassociation with the current network.
    pub async fn reassociate(&self) -> Result<(), ControlError> {
        self.run("REASSOCIATE").await
    }

    /// Reconnect if currently disconnected.
    pub async fn reconnect(&self) -> Result<(), ControlError> {
        self.run("RECONNECT").await
    }
}
