// MIT License - Copyright (c) 2026 Peter Wright
// Packet framing for the transceiver link

use crate::constants::{
    CMD_AUTH, ERR_AUTH_EXPIRED, HEADER_LEN, OFFSET_CHECKSUM, OFFSET_COMMAND, OFFSET_COUNT,
    OFFSET_DEVTYPE, OFFSET_ERROR, OFFSET_ID, OFFSET_MAC, OFFSET_PAYLOAD_CHECKSUM, PACKET_MAGIC,
    RM_SEND_DATA,
};
use crate::crypto::{LinkCipher, checksum};
use crate::error::LinkError;

/// Length of the plain authentication request payload.
pub const AUTH_PAYLOAD_LEN: usize = 0x50;

/// Header fields of an outgoing (or simulated incoming) packet.
///
/// # Layout
///
/// ```text
/// 0x00..0x08  magic 5a a5 aa 55 5a a5 aa 55
/// 0x20..0x22  checksum over the whole packet (LE)
/// 0x22..0x24  device error code (responses only, LE)
/// 0x24..0x26  device type (LE)
/// 0x26..0x28  command (LE)
/// 0x28..0x2a  packet counter (LE)
/// 0x2a..0x30  MAC address, reversed
/// 0x30..0x34  session id (LE)
/// 0x34..0x36  checksum over the plain payload (LE)
/// 0x38..      AES-128-CBC encrypted payload
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub devtype: u16,
    pub command: u16,
    pub count: u16,
    pub mac: [u8; 6],
    pub id: u32,
    pub error: u16,
}

/// Encode a packet: header, encrypted payload, then the outer checksum.
pub fn encode_packet(header: &PacketHeader, payload: &[u8], cipher: &LinkCipher) -> Vec<u8> {
    let mut packet = vec![0u8; HEADER_LEN];
    packet[..PACKET_MAGIC.len()].copy_from_slice(&PACKET_MAGIC);
    put_u16(&mut packet, OFFSET_ERROR, header.error);
    put_u16(&mut packet, OFFSET_DEVTYPE, header.devtype);
    put_u16(&mut packet, OFFSET_COMMAND, header.command);
    put_u16(&mut packet, OFFSET_COUNT, header.count);
    for (i, b) in header.mac.iter().rev().enumerate() {
        packet[OFFSET_MAC + i] = *b;
    }
    packet[OFFSET_ID..OFFSET_ID + 4].copy_from_slice(&header.id.to_le_bytes());
    put_u16(&mut packet, OFFSET_PAYLOAD_CHECKSUM, checksum(payload));

    packet.extend_from_slice(&cipher.encrypt(payload));

    let sum = checksum(&packet);
    put_u16(&mut packet, OFFSET_CHECKSUM, sum);
    packet
}

/// A validated packet received from the transceiver.
#[derive(Debug, Clone)]
pub struct Response {
    pub header: PacketHeader,
    /// Still-encrypted payload following the header.
    pub payload: Vec<u8>,
}

impl Response {
    /// Decrypt the payload with the current cipher.
    pub fn decrypt(&self, cipher: &LinkCipher) -> Result<Vec<u8>, LinkError> {
        cipher.decrypt(&self.payload)
    }
}

/// Parse and validate a received packet.
///
/// Rejects short packets and checksum mismatches as malformed, and maps a
/// non-zero device error code onto [`LinkError::SessionExpired`] or
/// [`LinkError::Rejected`].
pub fn decode_packet(data: &[u8]) -> Result<Response, LinkError> {
    if data.len() < HEADER_LEN {
        return Err(LinkError::MalformedPayload {
            details: format!("response of {} bytes is shorter than the header", data.len()),
        });
    }
    if data[..PACKET_MAGIC.len()] != PACKET_MAGIC {
        return Err(LinkError::MalformedPayload {
            details: "bad packet magic".to_string(),
        });
    }

    let nominal = get_u16(data, OFFSET_CHECKSUM);
    let mut zeroed = data.to_vec();
    put_u16(&mut zeroed, OFFSET_CHECKSUM, 0);
    let actual = checksum(&zeroed);
    if nominal != actual {
        return Err(LinkError::MalformedPayload {
            details: format!("checksum mismatch: expected {nominal:#06x}, computed {actual:#06x}"),
        });
    }

    let mut mac = [0u8; 6];
    for (i, b) in data[OFFSET_MAC..OFFSET_MAC + 6].iter().rev().enumerate() {
        mac[i] = *b;
    }
    let header = PacketHeader {
        devtype: get_u16(data, OFFSET_DEVTYPE),
        command: get_u16(data, OFFSET_COMMAND),
        count: get_u16(data, OFFSET_COUNT),
        mac,
        id: u32::from_le_bytes([
            data[OFFSET_ID],
            data[OFFSET_ID + 1],
            data[OFFSET_ID + 2],
            data[OFFSET_ID + 3],
        ]),
        error: get_u16(data, OFFSET_ERROR),
    };

    match header.error {
        0 => Ok(Response {
            header,
            payload: data[HEADER_LEN..].to_vec(),
        }),
        ERR_AUTH_EXPIRED => Err(LinkError::SessionExpired { code: header.error }),
        code => Err(LinkError::Rejected { code }),
    }
}

/// Plain payload of the authentication request.
pub fn auth_payload() -> [u8; AUTH_PAYLOAD_LEN] {
    let mut payload = [0u8; AUTH_PAYLOAD_LEN];
    payload[0x04..0x14].fill(0x31);
    payload[0x1e] = 0x01;
    payload[0x2d] = 0x01;
    payload[0x30..0x36].copy_from_slice(b"Test 1");
    payload
}

/// Extract `(session id, session key)` from a decrypted auth response.
pub fn parse_auth_response(plain: &[u8]) -> Result<(u32, [u8; 16]), LinkError> {
    if plain.len() < 0x14 {
        return Err(LinkError::MalformedPayload {
            details: format!("auth response payload of {} bytes is too short", plain.len()),
        });
    }
    let id = u32::from_le_bytes([plain[0], plain[1], plain[2], plain[3]]);
    let mut key = [0u8; 16];
    key.copy_from_slice(&plain[0x04..0x14]);
    Ok((id, key))
}

/// Plain payload of a request that transmits a stored RF/IR code.
pub fn send_data_payload(data: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(4 + data.len());
    payload.extend_from_slice(&RM_SEND_DATA.to_le_bytes());
    payload.extend_from_slice(data);
    payload
}

/// Whether a header carries an authentication command.
pub fn is_auth(header: &PacketHeader) -> bool {
    header.command == CMD_AUTH
}

fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn get_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}
