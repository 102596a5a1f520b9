// MIT License - Copyright (c) 2026 Peter Wright
// Transceiver with its covers

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::{CoverDefinition, TransceiverConfig};
use crate::devices::cover::{Cover, CoverAction, CoverStatus};
use crate::error::{ConfigError, Result};
use crate::event::{EventReceiver, EventSender, event_channel};
use crate::session::Session;
use crate::transport::DeviceLink;
use crate::transport::udp::UdpLink;

/// The main public API: one transceiver session and the covers behind it.
///
/// # Example
///
/// ```no_run
/// use broadlink_cover::{CoverAction, CoverDefinition, Transceiver, TransceiverConfig, parse_mac};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = TransceiverConfig::builder()
///         .host("192.168.0.50")
///         .mac(parse_mac("34:ea:34:b4:3a:0f")?)
///         .build();
///
///     let garage = CoverDefinition::from_encoded(
///         "garage",
///         Some("Garage Door".to_string()),
///         Some("JgBQAAABKJMUEhQ3FBIUEhQSFBIU"),
///         Some("JgBQAAABKZIUEhQSFDcUEhQSFBIU"),
///         None,
///         None,
///     )?;
///
///     let transceiver = Transceiver::connect(config, vec![garage]).await;
///     transceiver.execute("garage", CoverAction::Open).await?;
///     Ok(())
/// }
/// ```
pub struct Transceiver<L> {
    session: Arc<Session<L>>,
    covers: Vec<Arc<Cover<L>>>,
    event_tx: EventSender,
    /// Commands started with [`spawn_execute`](Self::spawn_execute)
    tasks: Mutex<JoinSet<()>>,
    accepting: AtomicBool,
}

impl Transceiver<UdpLink> {
    /// Open a UDP link to the transceiver, authenticate once and build the
    /// covers.
    pub async fn connect(config: TransceiverConfig, definitions: Vec<CoverDefinition>) -> Self {
        info!("Connecting to transceiver at {}", config.address());
        let auth_retries = config.auth_retries;
        let send_retries = config.send_retries;
        Self::with_link(UdpLink::new(config), auth_retries, send_retries, definitions).await
    }
}

impl<L: DeviceLink> Transceiver<L> {
    /// Build on an arbitrary link. Authenticates once; on failure every cover
    /// starts out offline.
    pub async fn with_link(
        link: L,
        auth_retries: u32,
        send_retries: u32,
        definitions: Vec<CoverDefinition>,
    ) -> Self {
        let (event_tx, _event_rx) = event_channel(256);
        let session = Arc::new(Session::connect(link, auth_retries, send_retries).await);

        let covers: Vec<Arc<Cover<L>>> = definitions
            .into_iter()
            .map(|def| {
                debug!(
                    "Cover {} ({}): open={} close={} stop={} trigger={:?}",
                    def.slug,
                    def.name,
                    def.commands.open.is_some(),
                    def.commands.close.is_some(),
                    def.commands.stop.is_some(),
                    def.trigger_time
                );
                Arc::new(Cover::new(def, Arc::clone(&session), event_tx.clone()))
            })
            .collect();

        if !session.is_valid() {
            warn!("Transceiver unreachable, marking {} covers offline", covers.len());
            for cover in &covers {
                cover.mark_offline().await;
            }
        }

        Self {
            session,
            covers,
            event_tx,
            tasks: Mutex::new(JoinSet::new()),
            accepting: AtomicBool::new(true),
        }
    }

    /// Subscribe to cover events.
    pub fn subscribe(&self) -> EventReceiver {
        self.event_tx.subscribe()
    }

    pub fn session(&self) -> &Arc<Session<L>> {
        &self.session
    }

    pub fn covers(&self) -> &[Arc<Cover<L>>] {
        &self.covers
    }

    pub fn cover(&self, slug: &str) -> Option<Arc<Cover<L>>> {
        self.covers.iter().find(|c| c.slug() == slug).cloned()
    }

    /// Run an action on the cover with the given slug.
    ///
    /// Errors only for an unknown slug; delivery failures come back as
    /// `Ok(false)`.
    pub async fn execute(&self, slug: &str, action: CoverAction) -> Result<bool> {
        let cover = self.cover(slug).ok_or_else(|| ConfigError::UnknownCover {
            slug: slug.to_string(),
        })?;
        Ok(cover.execute(action).await)
    }

    /// Status of every cover, in configuration order.
    pub async fn statuses(&self) -> Vec<(String, CoverStatus)> {
        let mut statuses = Vec::with_capacity(self.covers.len());
        for cover in &self.covers {
            statuses.push((cover.slug().to_string(), cover.status().await));
        }
        statuses
    }
}

impl<L: DeviceLink + 'static> Transceiver<L> {
    /// Run an action on its own task and return at once.
    ///
    /// Returns `Ok(false)` without running anything once
    /// [`shutdown`](Self::shutdown) has started.
    pub async fn spawn_execute(&self, slug: &str, action: CoverAction) -> Result<bool> {
        let cover = self.cover(slug).ok_or_else(|| ConfigError::UnknownCover {
            slug: slug.to_string(),
        })?;

        let mut tasks = self.tasks.lock().await;
        if !self.accepting.load(Ordering::Acquire) {
            warn!("Shutting down, dropping {action} for {slug}");
            return Ok(false);
        }
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            if !cover.execute(action).await {
                error!("{action} {} failed", cover.slug());
            }
        });
        Ok(true)
    }

    /// Stop accepting commands and wait for the running ones, including the
    /// travel wait and stop of a timed close.
    pub async fn shutdown(&self) {
        let mut tasks = {
            let mut tasks = self.tasks.lock().await;
            self.accepting.store(false, Ordering::Release);
            std::mem::take(&mut *tasks)
        };
        if !tasks.is_empty() {
            info!("Waiting for {} running commands", tasks.len());
        }
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!("Command task ended abnormally: {e}");
            }
        }
    }
}
