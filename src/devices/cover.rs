// MIT License - Copyright (c) 2026 Peter Wright
// Cover controller with assumed state

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Serialize, Serializer};
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::CoverDefinition;
use crate::constants::DEVICE_CLASS;
use crate::event::{CoverEvent, EventSender};
use crate::session::Session;
use crate::transport::DeviceLink;

/// Locally assumed position of a cover. Never confirmed by hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssumedState {
    Open,
    Closed,
    Opening,
    Closing,
    Stopped,
    Offline,
    Unknown,
}

impl AssumedState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Closing => "closing",
            Self::Stopped => "stopped",
            Self::Offline => "offline",
            Self::Unknown => "unknown",
        }
    }

    /// Tri-state closed flag: `None` when the position is not known at all.
    ///
    /// Reports the last position the cover is assumed to have reached: an
    /// opening cover still counts as closed, a closing one as not closed.
    pub fn is_closed(&self) -> Option<bool> {
        match self {
            Self::Unknown | Self::Offline => None,
            Self::Closed | Self::Opening => Some(true),
            Self::Open | Self::Closing | Self::Stopped => Some(false),
        }
    }
}

impl fmt::Display for AssumedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// Supported actions, using the usual home-automation cover feature bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CoverFeatures: u32 {
        const OPEN  = 1 << 0;
        const CLOSE = 1 << 1;
        const STOP  = 1 << 3;
    }
}

impl Serialize for CoverFeatures {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

/// A user-facing cover action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoverAction {
    Open,
    Close,
    Stop,
}

impl CoverAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Close => "CLOSE",
            Self::Stop => "STOP",
        }
    }
}

impl fmt::Display for CoverAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CoverAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OPEN" => Ok(Self::Open),
            "CLOSE" => Ok(Self::Close),
            "STOP" => Ok(Self::Stop),
            other => Err(format!("unknown cover action: {other}")),
        }
    }
}

/// Status snapshot read by the host platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverStatus {
    pub name: String,
    pub available: bool,
    pub is_closed: Option<bool>,
    pub state: AssumedState,
    pub features: CoverFeatures,
    pub device_class: &'static str,
    /// Always true: no sensor confirms the position
    pub assumed_state: bool,
}

/// One logical cover driven through a shared transceiver session.
///
/// Actions that have no stored code succeed without touching the session.
/// The assumed state only moves when the code was delivered.
///
/// With a trigger time configured, [`close`](Self::close) reports `closing`,
/// sleeps for the travel time without holding the session, sends the stop
/// code, and only then reports `closed`. The pending stop cannot be
/// cancelled.
pub struct Cover<L> {
    definition: CoverDefinition,
    session: Arc<Session<L>>,
    state: RwLock<AssumedState>,
    event_tx: EventSender,
}

impl<L: DeviceLink> Cover<L> {
    pub fn new(definition: CoverDefinition, session: Arc<Session<L>>, event_tx: EventSender) -> Self {
        Self {
            definition,
            session,
            state: RwLock::new(AssumedState::Unknown),
            event_tx,
        }
    }

    pub fn slug(&self) -> &str {
        &self.definition.slug
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub async fn state(&self) -> AssumedState {
        *self.state.read().await
    }

    pub async fn is_closed(&self) -> Option<bool> {
        self.state().await.is_closed()
    }

    /// Whether the transceiver session is currently authenticated.
    pub fn available(&self) -> bool {
        self.session.is_valid()
    }

    /// Actions with a stored code.
    pub fn supported_features(&self) -> CoverFeatures {
        let commands = &self.definition.commands;
        let mut features = CoverFeatures::empty();
        if commands.open.is_some() {
            features |= CoverFeatures::OPEN;
        }
        if commands.close.is_some() {
            features |= CoverFeatures::CLOSE;
        }
        if commands.stop.is_some() {
            features |= CoverFeatures::STOP;
        }
        features
    }

    pub async fn status(&self) -> CoverStatus {
        let state = self.state().await;
        CoverStatus {
            name: self.definition.name.clone(),
            available: self.available(),
            is_closed: state.is_closed(),
            state,
            features: self.supported_features(),
            device_class: DEVICE_CLASS,
            assumed_state: true,
        }
    }

    /// Run one action.
    pub async fn execute(&self, action: CoverAction) -> bool {
        match action {
            CoverAction::Open => self.open().await,
            CoverAction::Close => self.close().await,
            CoverAction::Stop => self.stop().await,
        }
    }

    pub async fn open(&self) -> bool {
        let Some(code) = self.definition.commands.open.as_deref() else {
            return self.skip(CoverAction::Open);
        };
        if !self.dispatch(CoverAction::Open, code).await {
            return false;
        }
        self.set_state(AssumedState::Open).await;
        true
    }

    pub async fn close(&self) -> bool {
        let Some(code) = self.definition.commands.close.as_deref() else {
            return self.skip(CoverAction::Close);
        };
        if !self.dispatch(CoverAction::Close, code).await {
            return false;
        }

        let Some(trigger_time) = self.definition.trigger_time else {
            self.set_state(AssumedState::Closed).await;
            return true;
        };

        self.set_state(AssumedState::Closing).await;
        debug!(
            "{}: waiting {:.1}s before stop",
            self.definition.slug,
            trigger_time.as_secs_f64()
        );
        sleep(trigger_time).await;
        let stopped = self.stop().await;
        self.set_state(AssumedState::Closed).await;
        stopped
    }

    /// Send the stop code. The assumed state is left alone.
    pub async fn stop(&self) -> bool {
        let Some(code) = self.definition.commands.stop.as_deref() else {
            return self.skip(CoverAction::Stop);
        };
        self.dispatch(CoverAction::Stop, code).await
    }

    /// Mark the cover as unreachable until a command gets through.
    pub async fn mark_offline(&self) {
        self.set_state(AssumedState::Offline).await;
    }

    fn skip(&self, action: CoverAction) -> bool {
        debug!("{}: no {} command configured, nothing to send", self.definition.slug, action);
        true
    }

    async fn dispatch(&self, action: CoverAction, code: &[u8]) -> bool {
        let cover = self.definition.slug.clone();
        if self.session.send_packet(code).await {
            info!("{cover}: {action} sent");
            let _ = self.event_tx.send(CoverEvent::CommandSent { cover, action });
            true
        } else {
            warn!("{cover}: {action} could not be delivered");
            let _ = self.event_tx.send(CoverEvent::CommandFailed { cover, action });
            false
        }
    }

    async fn set_state(&self, new: AssumedState) {
        let old = {
            let mut state = self.state.write().await;
            std::mem::replace(&mut *state, new)
        };
        if old != new {
            debug!("{}: {old} -> {new}", self.definition.slug);
            let _ = self.event_tx.send(CoverEvent::StateChanged {
                cover: self.definition.slug.clone(),
                old,
                new,
            });
        }
    }
}
