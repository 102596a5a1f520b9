// MIT License - Copyright (c) 2026 Peter Wright
// MQTT bridge

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rumqttc::{AsyncClient, Event, LastWill, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use broadlink_cover::mqtt::{MqttCoverStatus, PAYLOAD_OFFLINE, PAYLOAD_ONLINE, Topics, parse_command};
use broadlink_cover::{
    Cover, CoverDefinition, CoverEvent, Transceiver, TransceiverConfig, UdpLink, parse_mac,
};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "broadlink2mqtt")]
#[command(about = "Bridge between RF/IR covers on a Broadlink transceiver and MQTT")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Config {
    transceiver: TransceiverToml,
    mqtt: MqttToml,
    #[serde(default)]
    covers: BTreeMap<String, CoverToml>,
}

#[derive(Debug, Deserialize)]
struct TransceiverToml {
    host: String,
    mac: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_devtype")]
    devtype: u16,
    #[serde(default = "default_timeout")]
    timeout_secs: u64,
    #[serde(default = "default_retry")]
    auth_retries: u32,
    #[serde(default = "default_retry")]
    send_retries: u32,
    #[serde(default)]
    bind_addr: Option<String>,
}

fn default_port() -> u16 {
    broadlink_cover::constants::DEFAULT_PORT
}
fn default_devtype() -> u16 {
    broadlink_cover::constants::DEFAULT_DEVTYPE
}
fn default_timeout() -> u64 {
    broadlink_cover::constants::DEFAULT_TIMEOUT_SECS
}
fn default_retry() -> u32 {
    broadlink_cover::constants::DEFAULT_RETRY
}

#[derive(Debug, Deserialize)]
struct MqttToml {
    url: String,
    #[serde(default = "default_client_id")]
    client_id: String,
    #[serde(default = "default_topic_prefix")]
    topic_prefix: String,
}

fn default_client_id() -> String {
    "broadlink-bridge".to_string()
}
fn default_topic_prefix() -> String {
    "broadlink".to_string()
}

#[derive(Debug, Deserialize)]
struct CoverToml {
    #[serde(default)]
    friendly_name: Option<String>,
    #[serde(default)]
    command_open: Option<String>,
    #[serde(default)]
    command_close: Option<String>,
    #[serde(default)]
    command_stop: Option<String>,
    /// Travel time in seconds; when set, close is followed by stop
    #[serde(default)]
    trigger_time_secs: Option<f64>,
}

fn build_transceiver_config(toml: &TransceiverToml) -> Result<TransceiverConfig> {
    let mut builder = TransceiverConfig::builder()
        .host(&toml.host)
        .port(toml.port)
        .mac(parse_mac(&toml.mac)?)
        .devtype(toml.devtype)
        .timeout(Duration::from_secs(toml.timeout_secs))
        .auth_retries(toml.auth_retries)
        .send_retries(toml.send_retries);
    if let Some(addr) = &toml.bind_addr {
        builder = builder.bind_addr(addr);
    }
    Ok(builder.build())
}

fn build_cover_definitions(covers: &BTreeMap<String, CoverToml>) -> Result<Vec<CoverDefinition>> {
    covers
        .iter()
        .map(|(slug, cover)| -> Result<CoverDefinition> {
            let trigger_time = cover
                .trigger_time_secs
                .map(Duration::try_from_secs_f64)
                .transpose()
                .with_context(|| format!("Invalid trigger_time_secs for cover {slug}"))?;
            let definition = CoverDefinition::from_encoded(
                slug.clone(),
                cover.friendly_name.clone(),
                cover.command_open.as_deref(),
                cover.command_close.as_deref(),
                cover.command_stop.as_deref(),
                trigger_time,
            )?;
            Ok(definition)
        })
        .collect()
}

fn load_config(path: &str) -> Result<Config> {
    let text = std::fs::read_to_string(path).context("Failed to read config file")?;
    toml::from_str(&text).context("Failed to parse config file")
}

/// Everything derived from one config file.
struct Settings {
    transceiver: TransceiverConfig,
    covers: Vec<CoverDefinition>,
    mqtt_host: String,
    mqtt_port: u16,
    client_id: String,
    topics: Topics,
}

fn build_settings(config: Config) -> Result<Settings> {
    let transceiver = build_transceiver_config(&config.transceiver)?;
    let covers = build_cover_definitions(&config.covers)?;
    if covers.is_empty() {
        warn!("No covers configured");
    }
    let (mqtt_host, mqtt_port) = parse_mqtt_url(&config.mqtt.url)?;
    Ok(Settings {
        transceiver,
        covers,
        mqtt_host,
        mqtt_port,
        client_id: config.mqtt.client_id,
        topics: Topics::new(config.mqtt.topic_prefix),
    })
}

// ---------------------------------------------------------------------------
// Publishing
// ---------------------------------------------------------------------------

async fn publish_json(client: &AsyncClient, topic: &str, payload: &impl Serialize, retain: bool) {
    match serde_json::to_string(payload) {
        Ok(json) => {
            if let Err(e) = client.publish(topic, QoS::AtLeastOnce, retain, json).await {
                error!("Failed to publish to {topic}: {e}");
            }
        }
        Err(e) => error!("Failed to serialize MQTT payload: {e}"),
    }
}

async fn publish_text(client: &AsyncClient, topic: &str, payload: &str, retain: bool) {
    if let Err(e) = client.publish(topic, QoS::AtLeastOnce, retain, payload).await {
        error!("Failed to publish to {topic}: {e}");
    }
}

async fn publish_cover(client: &AsyncClient, topics: &Topics, cover: &Cover<UdpLink>) {
    let status = cover.status().await;
    publish_text(client, &topics.state(cover.slug()), status.state.as_str(), true).await;
    publish_json(
        client,
        &topics.status(cover.slug()),
        &MqttCoverStatus::new(cover.slug(), status),
        true,
    )
    .await;
}

async fn publish_all(client: &AsyncClient, topics: &Topics, transceiver: &Transceiver<UdpLink>) {
    for cover in transceiver.covers() {
        publish_cover(client, topics, cover).await;
    }
}

// ---------------------------------------------------------------------------
// Cover event → MQTT
// ---------------------------------------------------------------------------

async fn handle_cover_event(
    event: CoverEvent,
    client: &AsyncClient,
    topics: &Topics,
    transceiver: &Transceiver<UdpLink>,
) {
    let slug = match &event {
        CoverEvent::StateChanged { cover, old, new } => {
            info!("Cover {cover}: {old} -> {new}");
            cover
        }
        CoverEvent::CommandSent { cover, action } => {
            debug!("Cover {cover}: {action} delivered");
            cover
        }
        CoverEvent::CommandFailed { cover, action } => {
            warn!("Cover {cover}: {action} failed");
            cover
        }
    };
    // Availability follows the session, so refresh status after every event.
    if let Some(cover) = transceiver.cover(slug) {
        publish_cover(client, topics, &cover).await;
    }
}

// ---------------------------------------------------------------------------
// MQTT command handler
// ---------------------------------------------------------------------------

async fn handle_command(topic: &str, payload: &[u8], topics: &Topics, transceiver: &Transceiver<UdpLink>) {
    let Some(slug) = topics.command_slug(topic) else {
        return;
    };
    let action = match parse_command(payload) {
        Ok(action) => action,
        Err(e) => {
            warn!("Ignoring command for {slug}: {e}");
            return;
        }
    };

    info!("Command: {action} {slug}");
    // A timed close must not stall the MQTT event loop while it waits for the
    // travel time, so commands run on the transceiver's own tasks.
    if let Err(e) = transceiver.spawn_execute(slug, action).await {
        warn!("Ignoring command: {e}");
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=debug or RUST_LOG=broadlink_cover=trace).
    // Default: info.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // systemd journal already adds timestamps, so omit them when running under systemd
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();
    let mut settings = build_settings(load_config(&cli.config)?)?;

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        let transceiver = Arc::new(
            Transceiver::connect(settings.transceiver.clone(), settings.covers.clone()).await,
        );
        let topics = settings.topics.clone();

        // Set up MQTT
        let mut mqtt_opts =
            MqttOptions::new(&settings.client_id, &settings.mqtt_host, settings.mqtt_port);
        mqtt_opts.set_keep_alive(Duration::from_secs(30));
        mqtt_opts.set_last_will(LastWill::new(
            topics.availability(),
            PAYLOAD_OFFLINE,
            QoS::AtLeastOnce,
            true,
        ));
        let (client, mut eventloop) = AsyncClient::new(mqtt_opts, 256);

        client
            .subscribe(topics.command_filter(), QoS::AtLeastOnce)
            .await
            .context("Failed to subscribe to MQTT topic")?;
        info!("MQTT: subscribed to {}", topics.command_filter());

        publish_text(&client, &topics.availability(), PAYLOAD_ONLINE, true).await;
        publish_all(&client, &topics, &transceiver).await;

        // Task 1: cover event listener
        let transceiver_events = Arc::clone(&transceiver);
        let client_events = client.clone();
        let topics_events = topics.clone();
        let mut event_rx = transceiver.subscribe();
        let event_handle = tokio::spawn(async move {
            loop {
                match event_rx.recv().await {
                    Ok(event) => {
                        handle_cover_event(event, &client_events, &topics_events, &transceiver_events)
                            .await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Event receiver lagged, missed {n} events");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        info!("Event channel closed");
                        break;
                    }
                }
            }
        });

        // Task 2: MQTT event loop (receives messages, dispatches commands)
        let transceiver_cmds = Arc::clone(&transceiver);
        let client_cmds = client.clone();
        let topics_cmds = topics.clone();
        let mqtt_handle = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        // rumqttc does not resubscribe after a broker reconnect.
                        let filter = topics_cmds.command_filter();
                        info!("MQTT: connected, subscribing to {filter}");
                        if let Err(e) = client_cmds.subscribe(&filter, QoS::AtLeastOnce).await {
                            error!("Failed to subscribe to {filter}: {e}");
                        }
                        publish_text(&client_cmds, &topics_cmds.availability(), PAYLOAD_ONLINE, true)
                            .await;
                        publish_all(&client_cmds, &topics_cmds, &transceiver_cmds).await;
                    }
                    Ok(Event::Incoming(Packet::Publish(msg))) => {
                        debug!("MQTT message on {}", msg.topic);
                        handle_command(&msg.topic, &msg.payload, &topics_cmds, &transceiver_cmds).await;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("MQTT event loop error: {e}");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        // Wait for a signal
        info!("MQTT bridge running. Send SIGHUP to restart, SIGINT/SIGTERM to stop.");
        let restart = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down...");
                false
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                false
            }
            _ = sighup.recv() => {
                info!("Received SIGHUP, reloading config and restarting connections...");
                true
            }
        };

        // Let running commands finish (a pending timed close still sends its
        // stop) before the session is dropped or replaced by a new one. The
        // MQTT loop keeps running meanwhile so their results get published.
        transceiver.shutdown().await;
        event_handle.abort();
        publish_all(&client, &topics, &transceiver).await;

        publish_text(&client, &topics.availability(), PAYLOAD_OFFLINE, true).await;
        if let Err(e) = client.disconnect().await {
            debug!("MQTT disconnect: {e}");
        }

        mqtt_handle.abort();

        if !restart {
            break;
        }

        // Reload config from disk; keep previous config on failure
        info!("Reloading config from {}", cli.config);
        match load_config(&cli.config).and_then(build_settings) {
            Ok(new_settings) => {
                settings = new_settings;
                info!("Config reloaded successfully");
            }
            Err(e) => warn!("Failed to reload config, keeping previous: {e:#}"),
        }

        info!("Reconnecting...");
    }

    info!("Shutdown complete");
    Ok(())
}

/// Parse an MQTT URL like "mqtt://host:port" into (host, port).
fn parse_mqtt_url(url: &str) -> Result<(String, u16)> {
    let stripped = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    let (host, port_str) = stripped
        .rsplit_once(':')
        .context("MQTT URL must be in format mqtt://host:port")?;

    let port: u16 = port_str.parse().context("Invalid MQTT port number")?;

    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mqtt_url() {
        assert_eq!(parse_mqtt_url("mqtt://broker:1883").unwrap(), ("broker".to_string(), 1883));
        assert_eq!(parse_mqtt_url("tcp://10.0.0.2:1884").unwrap(), ("10.0.0.2".to_string(), 1884));
        assert_eq!(parse_mqtt_url("localhost:1883").unwrap(), ("localhost".to_string(), 1883));
        assert!(parse_mqtt_url("mqtt://broker").is_err());
        assert!(parse_mqtt_url("mqtt://broker:port").is_err());
    }

    #[test]
    fn test_config_parses_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [transceiver]
            host = "192.168.0.50"
            mac = "34:ea:34:b4:3a:0f"

            [mqtt]
            url = "mqtt://localhost:1883"

            [covers.garage]
            friendly_name = "Garage Door"
            command_open = "JgAMAA=="
            command_close = "JgAMAQ=="
            trigger_time_secs = 12.5

            [covers.blind]
            command_stop = "JgAMAg=="
            "#,
        )
        .unwrap();

        let settings = build_settings(config).unwrap();
        assert_eq!(settings.transceiver.port, 80);
        assert_eq!(settings.transceiver.timeout, Duration::from_secs(10));
        assert_eq!(settings.client_id, "broadlink-bridge");
        assert_eq!(settings.topics.availability(), "broadlink/availability");

        // BTreeMap keeps covers sorted by slug
        let slugs: Vec<&str> = settings.covers.iter().map(|c| c.slug.as_str()).collect();
        assert_eq!(slugs, ["blind", "garage"]);
        assert_eq!(settings.covers[0].name, "blind");
        assert_eq!(settings.covers[1].trigger_time, Some(Duration::from_millis(12_500)));
    }

    #[test]
    fn test_config_rejects_negative_trigger_time() {
        let covers = BTreeMap::from([(
            "garage".to_string(),
            CoverToml {
                friendly_name: None,
                command_open: None,
                command_close: None,
                command_stop: None,
                trigger_time_secs: Some(-1.0),
            },
        )]);
        assert!(build_cover_definitions(&covers).is_err());
    }

    #[test]
    fn test_config_rejects_bad_mac() {
        let toml = TransceiverToml {
            host: "10.0.0.5".to_string(),
            mac: "not-a-mac".to_string(),
            port: 80,
            devtype: 0x272a,
            timeout_secs: 10,
            auth_retries: 2,
            send_retries: 2,
            bind_addr: None,
        };
        assert!(build_transceiver_config(&toml).is_err());
    }
}
