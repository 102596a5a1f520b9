// MIT License - Copyright (c) 2026 Peter Wright
// Cover events

use crate::devices::cover::{AssumedState, CoverAction};

/// Events emitted by covers.
///
/// Users subscribe via `transceiver.subscribe()` to receive a
/// `tokio::sync::broadcast::Receiver<CoverEvent>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverEvent {
    /// Assumed state changed
    StateChanged {
        cover: String,
        old: AssumedState,
        new: AssumedState,
    },
    /// Command code transmitted
    CommandSent { cover: String, action: CoverAction },
    /// Command code could not be delivered
    CommandFailed { cover: String, action: CoverAction },
}

/// Type alias for the broadcast sender.
pub type EventSender = tokio::sync::broadcast::Sender<CoverEvent>;

/// Type alias for the broadcast receiver.
pub type EventReceiver = tokio::sync::broadcast::Receiver<CoverEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(capacity)
}
