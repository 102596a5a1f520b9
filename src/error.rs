// MIT License - Copyright (c) 2026 Peter Wright
// Error types

/// Errors raised by a [`DeviceLink`](crate::transport::DeviceLink).
///
/// These never escape the session layer: the session either repairs the
/// link and retries, or logs the error and reports a failed operation.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transceiver did not answer within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Malformed payload: {details}")]
    MalformedPayload { details: String },

    #[error("Session expired (device error {code:#06x})")]
    SessionExpired { code: u16 },

    #[error("Transceiver rejected request (device error {code:#06x})")]
    Rejected { code: u16 },
}

impl LinkError {
    /// Whether this error means the session should be repaired and the
    /// request sent again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LinkError::Io(_)
                | LinkError::Timeout { .. }
                | LinkError::MalformedPayload { .. }
                | LinkError::SessionExpired { .. }
        )
    }
}

/// Errors found while turning configuration into device definitions.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid MAC address: {mac}")]
    InvalidMac { mac: String },

    #[error("Invalid {action} command for cover {cover}: {reason}")]
    InvalidCommand {
        cover: String,
        action: &'static str,
        reason: String,
    },

    #[error("Unknown cover: {slug}")]
    UnknownCover { slug: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
