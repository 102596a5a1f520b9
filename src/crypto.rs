// MIT License - Copyright (c) 2026 Peter Wright
// Payload encryption for the transceiver link

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::NoPadding};

use crate::constants::{CHECKSUM_SEED, DEFAULT_IV, DEFAULT_KEY};
use crate::error::LinkError;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

const BLOCK_LEN: usize = 16;

/// AES-128-CBC cipher for packet payloads.
///
/// Starts out with the bootstrap key; authentication swaps in the session
/// key the transceiver hands back. The IV never changes.
#[derive(Debug, Clone)]
pub struct LinkCipher {
    key: [u8; 16],
    iv: [u8; 16],
}

impl Default for LinkCipher {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY,
            iv: DEFAULT_IV,
        }
    }
}

impl LinkCipher {
    pub fn new(key: [u8; 16]) -> Self {
        Self {
            key,
            iv: DEFAULT_IV,
        }
    }

    pub fn set_key(&mut self, key: [u8; 16]) {
        self.key = key;
    }

    /// Restore the bootstrap key (before a fresh handshake).
    pub fn reset(&mut self) {
        self.key = DEFAULT_KEY;
    }

    /// Zero-pad `plain` to a whole number of blocks and encrypt it.
    pub fn encrypt(&self, plain: &[u8]) -> Vec<u8> {
        let mut padded = plain.to_vec();
        padded.resize(padded_len(plain.len()), 0);
        Aes128CbcEnc::new(&self.key.into(), &self.iv.into())
            .encrypt_padded_vec_mut::<NoPadding>(&padded)
    }

    /// Decrypt a payload. Trailing zero padding is left in place.
    pub fn decrypt(&self, encrypted: &[u8]) -> Result<Vec<u8>, LinkError> {
        if encrypted.len() % BLOCK_LEN != 0 {
            return Err(LinkError::MalformedPayload {
                details: format!("encrypted payload of {} bytes is not block aligned", encrypted.len()),
            });
        }
        Aes128CbcDec::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_vec_mut::<NoPadding>(encrypted)
            .map_err(|e| LinkError::MalformedPayload {
                details: format!("decrypt failed: {e}"),
            })
    }
}

/// Length of `len` bytes after zero-padding to the block size.
pub fn padded_len(len: usize) -> usize {
    len.div_ceil(BLOCK_LEN) * BLOCK_LEN
}

/// Additive checksum used for both the header and the plain payload.
pub fn checksum(data: &[u8]) -> u16 {
    let sum = data
        .iter()
        .fold(CHECKSUM_SEED, |acc, &b| acc.wrapping_add(b as u32));
    (sum & 0xffff) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_seed() {
        assert_eq!(checksum(&[]), 0xbeaf);
        assert_eq!(checksum(&[1, 2, 3]), 0xbeb5);
    }

    #[test]
    fn test_checksum_wraps() {
        let data = vec![0xffu8; 0x200];
        let expected = ((0xbeafu32 + 0xff * 0x200) & 0xffff) as u16;
        assert_eq!(checksum(&data), expected);
    }

    #[test]
    fn test_padded_len() {
        assert_eq!(padded_len(0), 0);
        assert_eq!(padded_len(1), 16);
        assert_eq!(padded_len(16), 16);
        assert_eq!(padded_len(0x50), 0x50);
        assert_eq!(padded_len(0x51), 0x60);
    }

    #[test]
    fn test_encrypt_pads_and_decrypts() {
        let cipher = LinkCipher::default();
        let plain = [0x02, 0x00, 0x00, 0x00, 0x26, 0x00, 0x10];

        let encrypted = cipher.encrypt(&plain);
        assert_eq!(encrypted.len(), 16);
        assert_ne!(&encrypted[..plain.len()], &plain[..]);

        let decrypted = cipher.decrypt(&encrypted).unwrap();
        assert_eq!(&decrypted[..plain.len()], &plain[..]);
        assert!(decrypted[plain.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_session_key_changes_ciphertext() {
        let plain = [0x31u8; 32];
        let bootstrap = LinkCipher::default();
        let mut session = LinkCipher::new([0x42; 16]);
        assert_ne!(bootstrap.encrypt(&plain), session.encrypt(&plain));

        session.reset();
        assert_eq!(session.key, DEFAULT_KEY);
        assert_eq!(bootstrap.encrypt(&plain), session.encrypt(&plain));
    }

    #[test]
    fn test_decrypt_rejects_unaligned() {
        let cipher = LinkCipher::default();
        let err = cipher.decrypt(&[0u8; 17]).unwrap_err();
        assert!(matches!(err, LinkError::MalformedPayload { .. }));
    }
}
