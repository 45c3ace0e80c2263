//! Segment decryption.
//!
//! HLS `AES-128` encrypts every segment as a whole with AES-128-CBC and
//! PKCS#7 padding. The IV is either declared on the key tag or derived from
//! the segment's media sequence number (big-endian, zero-extended to 16 bytes).

use aes::Aes128;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use cbc::Decryptor;

use crate::resolver::EncryptionMethod;

/// A key with its bytes fetched, ready to decrypt segments.
#[derive(Debug, Clone)]
pub struct EncryptionKey {
    pub method: EncryptionMethod,
    pub key_bytes: Vec<u8>,
    pub key_uri: String,
    pub iv: Option<[u8; 16]>,
}

#[derive(Debug, thiserror::Error)]
pub enum DecryptError {
    #[error("unsupported encryption method {0}")]
    UnsupportedMethod(String),
    #[error("key {uri} is {len} bytes, expected 16")]
    KeyLength { uri: String, len: usize },
    #[error("AES-128-CBC decryption failed: {0}")]
    Cipher(String),
}

impl EncryptionKey {
    /// IV for the segment with media sequence number `sequence`.
    pub fn iv_for(&self, sequence: u64) -> [u8; 16] {
        self.iv.unwrap_or_else(|| sequence_iv(sequence))
    }

    /// Decrypts one whole segment.
    pub fn decrypt(&self, sequence: u64, data: &[u8]) -> Result<Vec<u8>, DecryptError> {
        if self.method != EncryptionMethod::Aes128 {
            return Err(DecryptError::UnsupportedMethod(self.method.to_string()));
        }
        let key: [u8; 16] = self
            .key_bytes
            .as_slice()
            .try_into()
            .map_err(|_| DecryptError::KeyLength {
                uri: self.key_uri.clone(),
                len: self.key_bytes.len(),
            })?;
        decrypt_aes128_cbc(&key, &self.iv_for(sequence), data)
    }
}

fn sequence_iv(sequence: u64) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[8..].copy_from_slice(&sequence.to_be_bytes());
    iv
}

/// AES-128-CBC with PKCS#7 unpadding over a complete buffer.
pub fn decrypt_aes128_cbc(
    key: &[u8; 16],
    iv: &[u8; 16],
    data: &[u8],
) -> Result<Vec<u8>, DecryptError> {
    let mut buf = data.to_vec();
    let plain_len = Decryptor::<Aes128>::new(key.into(), iv.into())
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|e| DecryptError::Cipher(e.to_string()))?
        .len();
    buf.truncate(plain_len);
    Ok(buf)
}
