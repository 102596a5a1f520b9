// MIT License - Copyright (c) 2026 Peter Wright
// Transceiver and cover configuration

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::constants::{DEFAULT_DEVTYPE, DEFAULT_PORT, DEFAULT_RETRY, DEFAULT_TIMEOUT_SECS};
use crate::error::{ConfigError, Result};

/// Configuration for one transceiver.
#[derive(Debug, Clone)]
pub struct TransceiverConfig {
    /// Transceiver IP address or host name
    pub host: String,
    /// UDP port (default: 80)
    pub port: u16,
    /// Hardware address, in display order
    pub mac: [u8; 6],
    /// Device type written into request headers
    pub devtype: u16,
    /// Per-request timeout
    pub timeout: Duration,
    /// Extra authentication attempts after the first (default: 2)
    pub auth_retries: u32,
    /// Re-authenticate-and-resend rounds after a failed send (default: 2)
    pub send_retries: u32,
    /// Local address to bind the UDP socket to (default: any)
    pub bind_addr: Option<String>,
}

impl Default for TransceiverConfig {
    fn default() -> Self {
        Self {
            host: "192.168.0.50".to_string(),
            port: DEFAULT_PORT,
            mac: [0; 6],
            devtype: DEFAULT_DEVTYPE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            auth_retries: DEFAULT_RETRY,
            send_retries: DEFAULT_RETRY,
            bind_addr: None,
        }
    }
}

impl TransceiverConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> TransceiverConfigBuilder {
        TransceiverConfigBuilder::default()
    }

    /// `host:port` of the transceiver.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for TransceiverConfig.
#[derive(Debug, Clone, Default)]
pub struct TransceiverConfigBuilder {
    config: TransceiverConfig,
}

impl TransceiverConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn mac(mut self, mac: [u8; 6]) -> Self {
        self.config.mac = mac;
        self
    }

    pub fn devtype(mut self, devtype: u16) -> Self {
        self.config.devtype = devtype;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn auth_retries(mut self, retries: u32) -> Self {
        self.config.auth_retries = retries;
        self
    }

    pub fn send_retries(mut self, retries: u32) -> Self {
        self.config.send_retries = retries;
        self
    }

    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_addr = Some(addr.into());
        self
    }

    pub fn build(self) -> TransceiverConfig {
        self.config
    }
}

/// Parse a MAC address written as `aa:bb:cc:dd:ee:ff`, `aa-bb-cc-dd-ee-ff`
/// or `aabbccddeeff`.
pub fn parse_mac(s: &str) -> Result<[u8; 6]> {
    let invalid = || ConfigError::InvalidMac { mac: s.to_string() };
    let hex: String = s.chars().filter(|c| *c != ':' && *c != '-').collect();
    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let mut mac = [0u8; 6];
    for (i, byte) in mac.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
    }
    Ok(mac)
}

/// The three stored RF/IR codes of a cover. `None` disables the action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverCommands {
    pub open: Option<Vec<u8>>,
    pub close: Option<Vec<u8>>,
    pub stop: Option<Vec<u8>>,
}

/// A cover as described by configuration, with its commands already decoded.
#[derive(Debug, Clone)]
pub struct CoverDefinition {
    /// Stable identifier used in topics
    pub slug: String,
    /// Display name
    pub name: String,
    pub commands: CoverCommands,
    /// Travel time after which a close is followed by a stop.
    /// `None` means close is reported as done immediately.
    pub trigger_time: Option<Duration>,
}

impl CoverDefinition {
    /// Build a definition from base64-encoded commands.
    ///
    /// The friendly name falls back to the slug. Empty command strings count
    /// as absent.
    pub fn from_encoded(
        slug: impl Into<String>,
        friendly_name: Option<String>,
        command_open: Option<&str>,
        command_close: Option<&str>,
        command_stop: Option<&str>,
        trigger_time: Option<Duration>,
    ) -> Result<Self> {
        let slug = slug.into();
        let commands = CoverCommands {
            open: decode_command(&slug, "open", command_open)?,
            close: decode_command(&slug, "close", command_close)?,
            stop: decode_command(&slug, "stop", command_stop)?,
        };
        Ok(Self {
            name: friendly_name.unwrap_or_else(|| slug.clone()),
            slug,
            commands,
            trigger_time,
        })
    }
}

/// Decode one stored command; `None` or an empty string yields `None`.
pub fn decode_command(cover: &str, action: &'static str, encoded: Option<&str>) -> Result<Option<Vec<u8>>> {
    let Some(encoded) = encoded.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    STANDARD
        .decode(encoded)
        .map(Some)
        .map_err(|e| ConfigError::InvalidCommand {
            cover: cover.to_string(),
            action,
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mac_formats() {
        let expected = [0x34, 0xea, 0x34, 0xb4, 0x3a, 0x0f];
        assert_eq!(parse_mac("34:ea:34:b4:3a:0f").unwrap(), expected);
        assert_eq!(parse_mac("34-EA-34-B4-3A-0F").unwrap(), expected);
        assert_eq!(parse_mac("34ea34b43a0f").unwrap(), expected);
    }

    #[test]
    fn test_parse_mac_invalid() {
        assert!(parse_mac("34:ea:34:b4:3a").is_err());
        assert!(parse_mac("34:ea:34:b4:3a:zz").is_err());
        assert!(parse_mac("").is_err());
        assert!(parse_mac("34:ea:34:b4:3a:0f:00").is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = TransceiverConfig::builder()
            .host("10.0.0.7")
            .mac([1, 2, 3, 4, 5, 6])
            .timeout(Duration::from_secs(3))
            .send_retries(4)
            .build();

        assert_eq!(config.host, "10.0.0.7");
        assert_eq!(config.address(), "10.0.0.7:80");
        assert_eq!(config.mac, [1, 2, 3, 4, 5, 6]);
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.send_retries, 4);
        assert_eq!(config.auth_retries, 2);
    }

    #[test]
    fn test_config_defaults() {
        let config = TransceiverConfig::builder().build();
        assert_eq!(config.port, 80);
        assert_eq!(config.devtype, 0x272a);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.auth_retries, 2);
        assert_eq!(config.send_retries, 2);
        assert!(config.bind_addr.is_none());
    }

    #[test]
    fn test_cover_definition_decodes_commands() {
        let def = CoverDefinition::from_encoded(
            "garage",
            Some("Garage Door".to_string()),
            Some("JgAMAA=="),
            Some("  JgAMAQ==  "),
            None,
            Some(Duration::from_secs(20)),
        )
        .unwrap();

        assert_eq!(def.name, "Garage Door");
        assert_eq!(def.commands.open, Some(vec![0x26, 0x00, 0x0c, 0x00]));
        assert_eq!(def.commands.close, Some(vec![0x26, 0x00, 0x0c, 0x01]));
        assert_eq!(def.commands.stop, None);
        assert_eq!(def.trigger_time, Some(Duration::from_secs(20)));
    }

    #[test]
    fn test_cover_definition_name_defaults_to_slug() {
        let def = CoverDefinition::from_encoded("shed", None, None, Some(""), None, None).unwrap();
        assert_eq!(def.name, "shed");
        assert_eq!(def.commands, CoverCommands::default());
    }

    #[test]
    fn test_cover_definition_rejects_bad_base64() {
        let err = CoverDefinition::from_encoded("shed", None, Some("not base64!"), None, None, None)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidCommand { action: "open", .. }
        ));
    }
}
