///! Field-level encryption for profile PII.
///! Each ciphertext is bound to its owner's id through AES-GCM associated data,
///! so a value copied onto another user's row fails to open.

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use rand_core::RngCore;
use thiserror::Error;
use uuid::Uuid;

const NONCE_LEN: usize = 12;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("encryption error")]
    Seal,
    #[error("decryption error")]
    Open,
    #[error("key must be 32 bytes")]
    InvalidKey,
}

#[derive(Clone)]
pub struct FieldCipher {
    cipher: Aes256Gcm,
}

impl FieldCipher {
    pub fn new(key_bytes: &[u8]) -> Result<Self, CryptoError> {
        if key_bytes.len() != 32 {
            return Err(CryptoError::InvalidKey);
        }
        let cipher = Aes256Gcm::new_from_slice(key_bytes).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { cipher })
    }

    /// Encrypts `value` for `owner`; output is base64(nonce || ciphertext).
    pub fn seal(&self, owner: Uuid, value: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let payload = Payload {
            msg: value.as_bytes(),
            aad: owner.as_bytes(),
        };
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), payload)
            .map_err(|_| CryptoError::Seal)?;
        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);
        Ok(general_purpose::STANDARD.encode(combined))
    }

    pub fn open(&self, owner: Uuid, encoded: &str) -> Result<String, CryptoError> {
        let data = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| CryptoError::Open)?;
        if data.len() <= NONCE_LEN {
            return Err(CryptoError::Open);
        }
        let (nonce_bytes, cipher_bytes) = data.split_at(NONCE_LEN);
        let payload = Payload {
            msg: cipher_bytes,
            aad: owner.as_bytes(),
        };
        let plain = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), payload)
            .map_err(|_| CryptoError::Open)?;
        String::from_utf8(plain).map_err(|_| CryptoError::Open)
    }

    pub fn seal_opt(&self, owner: Uuid, value: Option<&str>) -> Result<Option<String>, CryptoError> {
        value.map(|v| self.seal(owner, v)).transpose()
    }

    /// Unreadable values come back as `None` with a warning rather than failing the request.
    pub fn open_lossy(&self, owner: Uuid, encoded: Option<&str>) -> Option<String> {
        let encoded = encoded?;
        match self.open(owner, encoded) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Failed to decrypt field for user {}: {}", owner, e);
                None
            }
        }
    }
}
