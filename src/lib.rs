// MIT License - Copyright (c) 2026 Peter Wright
//
//! # broadlink-cover
//!
//! Drive garage doors, blinds and shutters through an RM-family RF/IR
//! transceiver on the local network.
//!
//! The transceiver can only replay stored codes and never reports back, so
//! this library keeps an authenticated session alive (repairing it when a
//! send fails) and tracks an *assumed* open/closed state for each cover from
//! the commands it has delivered.
//!
//! ## Quick Start
//!
//! ```no_run
//! use broadlink_cover::{CoverAction, CoverDefinition, Transceiver, TransceiverConfig, parse_mac};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = TransceiverConfig::builder()
//!         .host("192.168.0.50")
//!         .mac(parse_mac("34:ea:34:b4:3a:0f")?)
//!         .build();
//!
//!     let shutter = CoverDefinition::from_encoded(
//!         "shutter",
//!         None,
//!         Some("JgBQAAABKJMUEhQ3FBIUEhQSFBIU"),
//!         Some("JgBQAAABKZIUEhQSFDcUEhQSFBIU"),
//!         Some("JgBQAAABKZIUNxQSFDcUEhQSFBIU"),
//!         Some(std::time::Duration::from_secs(25)),
//!     )?;
//!
//!     let transceiver = Transceiver::connect(config, vec![shutter]).await;
//!
//!     let mut events = transceiver.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     transceiver.execute("shutter", CoverAction::Close).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod constants;
pub mod crypto;
pub mod devices;
pub mod error;
pub mod event;
pub mod mqtt;
pub mod protocol;
pub mod session;
pub mod transceiver;
pub mod transport;

// Re-exports for convenience
pub use config::{CoverCommands, CoverDefinition, TransceiverConfig, TransceiverConfigBuilder, parse_mac};
pub use devices::cover::{AssumedState, Cover, CoverAction, CoverFeatures, CoverStatus};
pub use error::{ConfigError, LinkError, Result};
pub use event::{CoverEvent, EventReceiver};
pub use session::Session;
pub use transceiver::Transceiver;
pub use transport::DeviceLink;
pub use transport::udp::UdpLink;
