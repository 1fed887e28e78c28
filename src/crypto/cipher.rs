//! Symmetric encryption of session payloads.
//!
//! The key is derived from the cookie secret: when the secret is valid
//! base64 that decodes to an AES key length it is used decoded, otherwise
//! the raw bytes are used. Ciphertexts are `base64url(nonce ‖ sealed)`.

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{aes::Aes192, Aes128Gcm, Aes256Gcm, AesGcm, Nonce};
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::RngCore;
use thiserror::Error;

type Aes192Gcm = AesGcm<Aes192, U12>;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("cookie secret must be 16, 24 or 32 bytes to create an AES cipher, got {0}")]
    KeyLength(usize),

    #[error("failed to encrypt session payload")]
    Encrypt,

    #[error("failed to decrypt session payload")]
    Decrypt,

    #[error("invalid ciphertext encoding: {0}")]
    Encoding(#[from] base64::DecodeError),
}

enum AeadKey {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
}

/// AES-GCM cipher for cookie payloads.
pub struct CookieCipher {
    key: AeadKey,
}

impl std::fmt::Debug for CookieCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bits = match self.key {
            AeadKey::Aes128(_) => 128,
            AeadKey::Aes192(_) => 192,
            AeadKey::Aes256(_) => 256,
        };
        f.debug_struct("CookieCipher").field("bits", &bits).finish()
    }
}

impl CookieCipher {
    /// Build a cipher from raw key bytes (16, 24 or 32 bytes).
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        let key = match key.len() {
            16 => AeadKey::Aes128(
                Aes128Gcm::new_from_slice(key).map_err(|_| CipherError::KeyLength(key.len()))?,
            ),
            24 => AeadKey::Aes192(
                Aes192Gcm::new_from_slice(key).map_err(|_| CipherError::KeyLength(key.len()))?,
            ),
            32 => AeadKey::Aes256(
                Aes256Gcm::new_from_slice(key).map_err(|_| CipherError::KeyLength(key.len()))?,
            ),
            other => return Err(CipherError::KeyLength(other)),
        };
        Ok(Self { key })
    }

    /// Build a cipher from the configured cookie secret.
    pub fn from_secret(secret: &str) -> Result<Self, CipherError> {
        Self::new(&secret_bytes(secret))
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::<U12>::from_slice(&nonce_bytes);

        let sealed = match &self.key {
            AeadKey::Aes128(c) => c.encrypt(nonce, plaintext.as_bytes()),
            AeadKey::Aes192(c) => c.encrypt(nonce, plaintext.as_bytes()),
            AeadKey::Aes256(c) => c.encrypt(nonce, plaintext.as_bytes()),
        }
        .map_err(|_| CipherError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(URL_SAFE.encode(out))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, CipherError> {
        let raw = URL_SAFE.decode(encoded)?;
        if raw.len() <= NONCE_LEN {
            return Err(CipherError::Decrypt);
        }
        let (nonce_bytes, sealed) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::<U12>::from_slice(nonce_bytes);

        let plain = match &self.key {
            AeadKey::Aes128(c) => c.decrypt(nonce, sealed),
            AeadKey::Aes192(c) => c.decrypt(nonce, sealed),
            AeadKey::Aes256(c) => c.decrypt(nonce, sealed),
        }
        .map_err(|_| CipherError::Decrypt)?;

        String::from_utf8(plain).map_err(|_| CipherError::Decrypt)
    }
}

/// Resolve the key bytes for a configured secret.
pub fn secret_bytes(secret: &str) -> Vec<u8> {
    let trimmed = secret.trim_end_matches('=');
    let decoded = URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed));
    match decoded {
        Ok(bytes) if matches!(bytes.len(), 16 | 24 | 32) => bytes,
        _ => secret.as_bytes().to_vec(),
    }
}
