// MIT License - Copyright (c) 2026 Peter Wright
// Protocol and device constants

/// Magic bytes opening every packet.
pub const PACKET_MAGIC: [u8; 8] = [0x5a, 0xa5, 0xaa, 0x55, 0x5a, 0xa5, 0xaa, 0x55];

/// Size of the packet header; the encrypted payload starts here.
pub const HEADER_LEN: usize = 0x38;

/// Header field offsets.
pub const OFFSET_CHECKSUM: usize = 0x20;
pub const OFFSET_ERROR: usize = 0x22;
pub const OFFSET_DEVTYPE: usize = 0x24;
pub const OFFSET_COMMAND: usize = 0x26;
pub const OFFSET_COUNT: usize = 0x28;
pub const OFFSET_MAC: usize = 0x2a;
pub const OFFSET_ID: usize = 0x30;
pub const OFFSET_PAYLOAD_CHECKSUM: usize = 0x34;

/// Seed for both header and payload checksums.
pub const CHECKSUM_SEED: u32 = 0xbeaf;

/// Bootstrap AES key used until the transceiver hands out a session key.
pub const DEFAULT_KEY: [u8; 16] = [
    0x09, 0x76, 0x28, 0x34, 0x3f, 0xe9, 0x9e, 0x23, 0x76, 0x5c, 0x15, 0x13, 0xac, 0xcf, 0x8b, 0x02,
];

/// Fixed AES IV.
pub const DEFAULT_IV: [u8; 16] = [
    0x56, 0x2e, 0x17, 0x99, 0x6d, 0x09, 0x3d, 0x28, 0xdd, 0xb3, 0xba, 0x69, 0x5a, 0x2e, 0x6f, 0x58,
];

/// Packet command types.
pub const CMD_AUTH: u16 = 0x65;
pub const CMD_REQUEST: u16 = 0x6a;

/// Sub-command prefixed to an RM request payload to transmit a stored code.
pub const RM_SEND_DATA: u32 = 0x02;

/// Device error returned when the session key is no longer accepted.
pub const ERR_AUTH_EXPIRED: u16 = 0xfff9;

/// Default device type reported in outgoing headers (RM family).
pub const DEFAULT_DEVTYPE: u16 = 0x272a;

/// Transceiver UDP port.
pub const DEFAULT_PORT: u16 = 80;

/// Request timeout when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Extra attempts after the first one, for authentication and for sending.
pub const DEFAULT_RETRY: u32 = 2;

/// Largest datagram accepted from the transceiver.
pub const MAX_RESPONSE_LEN: usize = 2048;

/// Device class reported for every cover.
pub const DEVICE_CLASS: &str = "garage";
