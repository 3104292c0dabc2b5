//! Pre-parsed server configuration (spec §6): interface rules and debug
//! flags. Parsing the surrounding config file format is out of scope here;
//! this module only defines the shape the driver consumes, the same way
//! the overlay core takes pre-parsed rules rather than touching a config
//! file itself.

use std::time::Duration;

use relaymesh_core::interface::{InterfaceKind, SocketType};
use serde::Deserialize;

/// One interface's configuration, matched against discovered interfaces by
/// `name_glob` (spec §4.2 discovery).
#[derive(Debug, Clone, Deserialize)]
pub struct InterfaceRule {
    /// Shell-style glob matched against the OS interface name (`eth*`,
    /// `wlan0`, or a literal path for file/stream transports).
    pub name_glob: String,
    /// Transport encapsulation.
    pub socket_type: SocketType,
    /// Medium, used for comparator ordering and default tick cadence.
    pub kind: InterfaceKind,
    /// Whether this interface carries broadcast traffic.
    #[serde(default = "default_true")]
    pub broadcast: bool,
    /// Maximum transmission unit in bytes.
    #[serde(default = "default_mtu")]
    pub mtu: usize,
    /// Self-announcement cadence override; `None` falls back to the
    /// medium's default (spec §4.2).
    #[serde(default)]
    pub mdp_tick_ms: Option<u64>,
    /// Minimum spacing between consecutive transmissions (token-bucket
    /// refill interval).
    #[serde(default = "default_packet_interval_ms")]
    pub packet_interval_ms: u64,
    /// Fraction of inbound broadcasts to silently drop, for deterministic
    /// loss injection on file/stream transports in testing.
    #[serde(default)]
    pub broadcast_drop_rate: f32,
    /// When set, all inbound unicasts on this interface are dropped.
    #[serde(default)]
    pub drop_unicasts: bool,
    /// UDP port for datagram interfaces.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Backing file path for a `File` socket type; ignored otherwise.
    #[serde(default)]
    pub path: Option<String>,
}

impl InterfaceRule {
    /// Resolved tick interval: the override if present, else the medium's
    /// default (which may be `None`, i.e. tickless).
    #[must_use]
    pub fn tick_interval(&self) -> Option<Duration> {
        self.mdp_tick_ms
            .map(Duration::from_millis)
            .or_else(|| relaymesh_core::Interface::default_tick_interval(self.kind))
    }

    /// Token-bucket refill interval.
    #[must_use]
    pub fn packet_interval(&self) -> Duration {
        Duration::from_millis(self.packet_interval_ms)
    }
}

fn default_true() -> bool {
    true
}

fn default_mtu() -> usize {
    1400
}

fn default_packet_interval_ms() -> u64 {
    100
}

fn default_port() -> u16 {
    4110
}

/// Named debug flags controlling `tracing` span/event verbosity per
/// component (spec §9: replaces the original's compile-time debug flags).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DebugFlags {
    /// Flag names enabled for this run, matched against the `tracing`
    /// target names the crate logs under (e.g. `relaymesh_core::scheduler`).
    #[serde(default)]
    pub enabled: Vec<String>,
}

impl DebugFlags {
    /// `true` if `target` was named in the enabled list.
    #[must_use]
    pub fn is_enabled(&self, target: &str) -> bool {
        self.enabled.iter().any(|f| f == target)
    }
}

/// Complete server configuration: local identity, interface rules and
/// debug flags.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    /// This node's SID, hex-encoded (64 characters).
    pub self_sid: String,
    /// Interface rules, matched in order against discovered interfaces.
    #[serde(default)]
    pub interfaces: Vec<InterfaceRule>,
    /// Debug flag configuration.
    #[serde(default)]
    pub debug: DebugFlags,
}

impl ServerConfig {
    /// Decode `self_sid` into a [`relaymesh_proto::Sid`].
    pub fn parse_self_sid(&self) -> Result<relaymesh_proto::Sid, crate::error::ServerError> {
        let bytes = hex::decode(&self.self_sid)
            .map_err(|e| crate::error::ServerError::Config(format!("self_sid: {e}")))?;
        let array: [u8; relaymesh_proto::Sid::LEN] = bytes
            .try_into()
            .map_err(|_| crate::error::ServerError::Config("self_sid must be 32 bytes".into()))?;
        Ok(relaymesh_proto::Sid::from_bytes(array))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_interval_override_takes_precedence() {
        let rule = InterfaceRule {
            name_glob: "eth*".into(),
            socket_type: SocketType::Dgram,
            kind: InterfaceKind::Ethernet,
            broadcast: true,
            mtu: 1400,
            mdp_tick_ms: Some(250),
            packet_interval_ms: 100,
            broadcast_drop_rate: 0.0,
            drop_unicasts: false,
            port: 4110,
            path: None,
        };
        assert_eq!(rule.tick_interval(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn tick_interval_falls_back_to_medium_default() {
        let rule = InterfaceRule {
            name_glob: "wlan*".into(),
            socket_type: SocketType::Dgram,
            kind: InterfaceKind::PacketRadio,
            broadcast: true,
            mtu: 255,
            mdp_tick_ms: None,
            packet_interval_ms: 100,
            broadcast_drop_rate: 0.0,
            drop_unicasts: false,
            port: 4110,
            path: None,
        };
        assert_eq!(rule.tick_interval(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn debug_flag_lookup() {
        let flags = DebugFlags { enabled: vec!["relaymesh_core::scheduler".into()] };
        assert!(flags.is_enabled("relaymesh_core::scheduler"));
        assert!(!flags.is_enabled("relaymesh_core::route_table"));
    }
}
