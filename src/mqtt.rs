// MIT License - Copyright (c) 2026 Peter Wright
// MQTT topics and payloads

use chrono::Utc;
use serde::Serialize;

use crate::devices::cover::{CoverAction, CoverStatus};

pub const PAYLOAD_ONLINE: &str = "online";
pub const PAYLOAD_OFFLINE: &str = "offline";

/// Topic layout under a common prefix.
///
/// ```text
/// <prefix>/availability      online | offline (retained)
/// <prefix>/<slug>/set        OPEN | CLOSE | STOP (subscribed)
/// <prefix>/<slug>/state      open | closed | closing | ... (retained)
/// <prefix>/<slug>/status     JSON status (retained)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    prefix: String,
}

impl Topics {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn availability(&self) -> String {
        format!("{}/availability", self.prefix)
    }

    pub fn command(&self, slug: &str) -> String {
        format!("{}/{slug}/set", self.prefix)
    }

    /// Wildcard filter matching every cover's command topic.
    pub fn command_filter(&self) -> String {
        format!("{}/+/set", self.prefix)
    }

    pub fn state(&self, slug: &str) -> String {
        format!("{}/{slug}/state", self.prefix)
    }

    pub fn status(&self, slug: &str) -> String {
        format!("{}/{slug}/status", self.prefix)
    }

    /// Slug addressed by a command topic, if `topic` is one.
    pub fn command_slug<'a>(&self, topic: &'a str) -> Option<&'a str> {
        let slug = topic
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix('/')?
            .strip_suffix("/set")?;
        (!slug.is_empty() && !slug.contains('/')).then_some(slug)
    }
}

/// Parse a command payload (`OPEN`, `CLOSE` or `STOP`, any case).
pub fn parse_command(payload: &[u8]) -> Result<CoverAction, String> {
    let text = std::str::from_utf8(payload).map_err(|e| format!("payload is not UTF-8: {e}"))?;
    text.parse()
}

/// Retained JSON status: `{now, slug, name, available, is_closed, state, features, device_class, assumed_state}`.
#[derive(Debug, Serialize)]
pub struct MqttCoverStatus {
    pub now: u64,
    pub slug: String,
    #[serde(flatten)]
    pub status: CoverStatus,
}

impl MqttCoverStatus {
    pub fn new(slug: &str, status: CoverStatus) -> Self {
        Self {
            now: now_epoch_ms(),
            slug: slug.to_string(),
            status,
        }
    }
}

pub fn now_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_layout() {
        let topics = Topics::new("broadlink/");
        assert_eq!(topics.availability(), "broadlink/availability");
        assert_eq!(topics.command("garage"), "broadlink/garage/set");
        assert_eq!(topics.command_filter(), "broadlink/+/set");
        assert_eq!(topics.state("garage"), "broadlink/garage/state");
        assert_eq!(topics.status("garage"), "broadlink/garage/status");
    }

    #[test]
    fn test_command_slug() {
        let topics = Topics::new("home/rf");
        assert_eq!(topics.command_slug("home/rf/garage/set"), Some("garage"));
        assert_eq!(topics.command_slug("home/rf/garage/state"), None);
        assert_eq!(topics.command_slug("home/rf//set"), None);
        assert_eq!(topics.command_slug("home/rf/a/b/set"), None);
        assert_eq!(topics.command_slug("home/rfx/garage/set"), None);
        assert_eq!(topics.command_slug("other/garage/set"), None);
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command(b"OPEN"), Ok(CoverAction::Open));
        assert_eq!(parse_command(b"close"), Ok(CoverAction::Close));
        assert_eq!(parse_command(b"STOP\n"), Ok(CoverAction::Stop));
        assert!(parse_command(b"SET_POSITION").is_err());
        assert!(parse_command(&[0xff, 0xfe]).is_err());
    }
}
