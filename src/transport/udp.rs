// MIT License - Copyright (c) 2026 Peter Wright
// UDP link to an RM-family transceiver

use std::time::Duration;

use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::config::TransceiverConfig;
use crate::constants::{CMD_AUTH, CMD_REQUEST, MAX_RESPONSE_LEN};
use crate::crypto::LinkCipher;
use crate::error::LinkError;
use crate::protocol::{
    PacketHeader, Response, auth_payload, decode_packet, encode_packet, parse_auth_response,
    send_data_payload,
};
use crate::transport::DeviceLink;

/// Encrypted request/response link over UDP.
///
/// Each request is a single datagram answered by a single datagram. The
/// socket is bound lazily and thrown away after any exchange that did not
/// produce a reply, so a late answer can never be mistaken for the response
/// to the next request.
pub struct UdpLink {
    config: TransceiverConfig,
    socket: Option<UdpSocket>,
    cipher: LinkCipher,
    id: u32,
    count: u16,
}

impl UdpLink {
    pub fn new(config: TransceiverConfig) -> Self {
        Self {
            config,
            socket: None,
            cipher: LinkCipher::default(),
            id: 0,
            count: 0,
        }
    }

    /// Session id handed out by the last successful handshake (0 before).
    pub fn session_id(&self) -> u32 {
        self.id
    }

    async fn open_socket(&self) -> Result<UdpSocket, LinkError> {
        let bind = self.config.bind_addr.as_deref().unwrap_or("0.0.0.0:0");
        let socket = UdpSocket::bind(bind).await?;
        socket.connect(self.config.address()).await?;
        debug!(
            "UDP socket {} connected to {}",
            socket.local_addr()?,
            self.config.address()
        );
        Ok(socket)
    }

    /// Encode, send and await the matching reply for one request.
    async fn send_packet(&mut self, command: u16, payload: &[u8]) -> Result<Response, LinkError> {
        self.count = self.count.wrapping_add(1) | 0x8000;
        let header = PacketHeader {
            devtype: self.config.devtype,
            command,
            count: self.count,
            mac: self.config.mac,
            id: self.id,
            error: 0,
        };
        let packet = encode_packet(&header, payload, &self.cipher);

        let socket = match self.socket.take() {
            Some(socket) => socket,
            None => self.open_socket().await?,
        };

        let result = exchange(&socket, &packet, self.config.timeout).await;
        if result.is_ok() {
            self.socket = Some(socket);
        } else {
            debug!("Discarding UDP socket after failed exchange");
        }

        decode_packet(&result?)
    }
}

impl DeviceLink for UdpLink {
    async fn authenticate(&mut self) -> Result<bool, LinkError> {
        self.cipher.reset();
        self.id = 0;

        debug!("Sending authentication request to {}", self.config.address());
        let response = match self.send_packet(CMD_AUTH, &auth_payload()).await {
            Ok(response) => response,
            Err(LinkError::Rejected { code }) => {
                warn!("Transceiver refused authentication (device error {code:#06x})");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let plain = response.decrypt(&self.cipher)?;
        let (id, key) = parse_auth_response(&plain)?;
        self.id = id;
        self.cipher.set_key(key);

        info!("Authenticated with transceiver at {}", self.config.address());
        Ok(true)
    }

    async fn send_data(&mut self, data: &[u8]) -> Result<(), LinkError> {
        if data.is_empty() {
            return Err(LinkError::MalformedPayload {
                details: "empty code".to_string(),
            });
        }
        self.send_packet(CMD_REQUEST, &send_data_payload(data)).await?;
        debug!("Transmitted {} byte code", data.len());
        Ok(())
    }
}

async fn exchange(socket: &UdpSocket, packet: &[u8], timeout: Duration) -> Result<Vec<u8>, LinkError> {
    socket.send(packet).await?;

    let mut buf = vec![0u8; MAX_RESPONSE_LEN];
    match tokio::time::timeout(timeout, socket.recv(&mut buf)).await {
        Ok(Ok(n)) => {
            buf.truncate(n);
            Ok(buf)
        }
        Ok(Err(e)) => Err(LinkError::Io(e)),
        Err(_) => Err(LinkError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}
