// MIT License - Copyright (c) 2026 Peter Wright
// Device link abstraction

pub mod udp;

use std::future::Future;

use crate::error::LinkError;

/// A link to one RF/IR transceiver.
///
/// The session layer only ever talks to the hardware through this trait, so
/// tests can substitute a scripted link for the UDP one.
pub trait DeviceLink: Send {
    /// Run the authentication handshake.
    ///
    /// `Ok(false)` means the transceiver answered but refused the session.
    fn authenticate(&mut self) -> impl Future<Output = Result<bool, LinkError>> + Send;

    /// Transmit a stored RF/IR code.
    fn send_data(&mut self, data: &[u8]) -> impl Future<Output = Result<(), LinkError>> + Send;
}
