// MIT License - Copyright (c) 2026 Peter Wright
// Authenticated session with a transceiver

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::constants::DEFAULT_RETRY;
use crate::transport::DeviceLink;

/// Owns the link to one transceiver and keeps it authenticated.
///
/// The transceiver silently drops idle sessions, so nothing refreshes the
/// session proactively: the first failed send triggers a repair. All link
/// traffic goes through one async mutex, so authentication repairs started by
/// different covers never interleave.
///
/// Neither [`authenticate`](Self::authenticate) nor
/// [`send_packet`](Self::send_packet) return errors. Failures are logged and
/// reported as `false`, and the session stays usable for the next call.
pub struct Session<L> {
    link: Mutex<L>,
    valid: AtomicBool,
    auth_retries: u32,
    send_retries: u32,
}

impl<L: DeviceLink> Session<L> {
    /// Wrap a link with the default retry budgets. The session starts out
    /// unauthenticated.
    pub fn new(link: L) -> Self {
        Self::with_retries(link, DEFAULT_RETRY, DEFAULT_RETRY)
    }

    /// `auth_retries` extra handshake attempts per authentication;
    /// `send_retries` re-authenticate-and-resend rounds per packet.
    pub fn with_retries(link: L, auth_retries: u32, send_retries: u32) -> Self {
        Self {
            link: Mutex::new(link),
            valid: AtomicBool::new(false),
            auth_retries,
            send_retries,
        }
    }

    /// Create the session and authenticate once.
    ///
    /// A failed handshake is logged, not returned: the session is still
    /// handed back and the next send repairs it.
    pub async fn connect(link: L, auth_retries: u32, send_retries: u32) -> Self {
        let session = Self::with_retries(link, auth_retries, send_retries);
        if session.authenticate().await {
            info!("Transceiver session established");
        } else {
            error!("Failed to connect to transceiver");
        }
        session
    }

    /// Whether the last handshake succeeded and no send has failed since.
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Authenticate, trying up to `auth_retries + 1` times without backoff.
    pub async fn authenticate(&self) -> bool {
        let mut link = self.link.lock().await;
        self.authenticate_locked(&mut link).await
    }

    /// Transmit a payload, repairing the session when the link reports a
    /// transport failure.
    ///
    /// A send on a session already known to be invalid authenticates first.
    /// After a retryable failure the session re-authenticates and resends,
    /// at most `send_retries` times; a failed re-authentication ends the
    /// operation immediately.
    pub async fn send_packet(&self, payload: &[u8]) -> bool {
        let mut link = self.link.lock().await;

        if !self.is_valid() {
            debug!("Session not authenticated, authenticating before send");
            if !self.authenticate_locked(&mut link).await {
                return false;
            }
        }

        let mut retry = self.send_retries;
        loop {
            match link.send_data(payload).await {
                Ok(()) => return true,
                Err(e) => {
                    self.valid.store(false, Ordering::Release);
                    if !e.is_retryable() {
                        error!("Failed to send packet: {e}");
                        return false;
                    }
                    if retry == 0 {
                        error!("Failed to send packet after {} retries: {e}", self.send_retries);
                        return false;
                    }
                    warn!("Send failed ({e}), re-authenticating");
                    if !self.authenticate_locked(&mut link).await {
                        return false;
                    }
                    retry -= 1;
                }
            }
        }
    }

    async fn authenticate_locked(&self, link: &mut L) -> bool {
        let attempts = self.auth_retries + 1;
        for attempt in 1..=attempts {
            match link.authenticate().await {
                Ok(true) => {
                    self.valid.store(true, Ordering::Release);
                    return true;
                }
                Ok(false) => debug!("Authentication attempt {attempt}/{attempts} refused"),
                Err(e) => debug!("Authentication attempt {attempt}/{attempts} failed: {e}"),
            }
        }
        self.valid.store(false, Ordering::Release);
        warn!("Authentication failed after {attempts} attempts");
        false
    }
}
