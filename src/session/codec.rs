//! Signed cookie values.
//!
//! Wire format:
//!
//! ```text
//! base64url( payload "|" unix_timestamp "|" hex(MAC(secret, name ‖ payload ‖ timestamp)) )
//! ```
//!
//! The cookie name is part of the MAC input so a value cannot be replayed
//! under another cookie.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use thiserror::Error;
use time::OffsetDateTime;

use crate::crypto::{HashAlgorithm, InvalidKey};

/// Browsers drop cookies larger than this.
pub const MAX_COOKIE_BYTES: usize = 4096;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CookieError {
    #[error("cookie value is not valid base64url")]
    Encoding,

    #[error("cookie value is malformed")]
    Format,

    #[error("cookie timestamp is invalid")]
    Timestamp,

    #[error("cookie signature does not match")]
    Signature,

    #[error(transparent)]
    Key(#[from] InvalidKey),
}

/// Signs and verifies cookie values.
#[derive(Clone)]
pub struct CookieCodec {
    secret: Vec<u8>,
    algorithm: HashAlgorithm,
}

impl std::fmt::Debug for CookieCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieCodec")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl CookieCodec {
    pub fn new(secret: impl Into<Vec<u8>>, algorithm: HashAlgorithm) -> Self {
        Self {
            secret: secret.into(),
            algorithm,
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn sign(&self, name: &str, payload: &str, now: OffsetDateTime) -> Result<String, CookieError> {
        let timestamp = now.unix_timestamp().to_string();
        let tag = self.tag(name, payload, &timestamp)?;
        let token = URL_SAFE.encode(format!("{payload}|{timestamp}|{}", hex::encode(tag)));

        if token.len() > MAX_COOKIE_BYTES {
            tracing::warn!(
                cookie = %name,
                size = token.len(),
                "Signed cookie exceeds browser size limit"
            );
        }
        Ok(token)
    }

    /// Verify `token` and return the payload with its age.
    ///
    /// Any failure yields an error and never a partial payload.
    pub fn verify(
        &self,
        name: &str,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<(String, Duration), CookieError> {
        let raw = URL_SAFE.decode(token).map_err(|_| CookieError::Encoding)?;
        let raw = String::from_utf8(raw).map_err(|_| CookieError::Encoding)?;

        let mut fields = raw.rsplitn(3, '|');
        let (tag_hex, timestamp, payload) = match (fields.next(), fields.next(), fields.next()) {
            (Some(tag), Some(ts), Some(payload)) => (tag, ts, payload),
            _ => return Err(CookieError::Format),
        };

        let tag = hex::decode(tag_hex).map_err(|_| CookieError::Format)?;
        let verified = self.algorithm.verify(
            &self.secret,
            &[name.as_bytes(), payload.as_bytes(), timestamp.as_bytes()],
            &tag,
        );
        if !verified {
            return Err(CookieError::Signature);
        }

        let issued: i64 = timestamp.parse().map_err(|_| CookieError::Timestamp)?;
        let age = now.unix_timestamp().saturating_sub(issued).max(0) as u64;
        Ok((payload.to_string(), Duration::from_secs(age)))
    }

    fn tag(&self, name: &str, payload: &str, timestamp: &str) -> Result<Vec<u8>, InvalidKey> {
        self.algorithm.mac(
            &self.secret,
            &[name.as_bytes(), payload.as_bytes(), timestamp.as_bytes()],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(secs).unwrap()
    }

    fn codec() -> CookieCodec {
        CookieCodec::new("secret-value", HashAlgorithm::Sha256)
    }

    #[test]
    fn sign_then_verify_at_same_instant() {
        let token = codec().sign("_session", "email: user:alice", at(1_700_000_000)).unwrap();
        let (payload, age) = codec().verify("_session", &token, at(1_700_000_000)).unwrap();
        assert_eq!(payload, "email: user:alice");
        assert_eq!(age, Duration::ZERO);
    }

    #[test]
    fn age_is_elapsed_seconds() {
        let token = codec().sign("_session", "p", at(1_000)).unwrap();
        let (_, age) = codec().verify("_session", &token, at(1_090)).unwrap();
        assert_eq!(age, Duration::from_secs(90));
    }

    #[test]
    fn wire_format_is_base64url_of_pipe_fields() {
        let token = codec().sign("_session", "payload", at(42)).unwrap();
        let raw = String::from_utf8(URL_SAFE.decode(&token).unwrap()).unwrap();
        let parts: Vec<&str> = raw.split('|').collect();
        assert_eq!(parts[0], "payload");
        assert_eq!(parts[1], "42");
        let expected = HashAlgorithm::Sha256.mac(b"secret-value", &[b"_session", b"payload", b"42"]).unwrap();
        assert_eq!(parts[2], hex::encode(expected));
    }

    #[test]
    fn payload_may_contain_separator() {
        let token = codec().sign("c", "a|b|c", at(5)).unwrap();
        assert_eq!(codec().verify("c", &token, at(5)).unwrap().0, "a|b|c");
    }

    #[test]
    fn every_single_byte_flip_is_rejected() {
        let token = codec().sign("_session", "email: user:alice", at(1_700_000_000)).unwrap();
        let bytes = token.as_bytes();
        for i in 0..bytes.len() {
            let mut tampered = bytes.to_vec();
            tampered[i] ^= 0x01;
            let tampered = String::from_utf8_lossy(&tampered).into_owned();
            assert!(
                codec().verify("_session", &tampered, at(1_700_000_000)).is_err(),
                "flip at byte {i} was accepted"
            );
        }
    }

    #[test]
    fn other_secret_or_name_is_rejected() {
        let token = codec().sign("_session", "p", at(10)).unwrap();
        let other = CookieCodec::new("different", HashAlgorithm::Sha256);
        assert_eq!(other.verify("_session", &token, at(10)), Err(CookieError::Signature));
        assert_eq!(codec().verify("_other", &token, at(10)), Err(CookieError::Signature));
    }

    #[test]
    fn malformed_values() {
        assert_eq!(codec().verify("c", "***", at(0)), Err(CookieError::Encoding));
        let no_fields = URL_SAFE.encode("justone");
        assert_eq!(codec().verify("c", &no_fields, at(0)), Err(CookieError::Format));
        let bad_hex = URL_SAFE.encode("p|10|zz");
        assert_eq!(codec().verify("c", &bad_hex, at(0)), Err(CookieError::Format));
    }
}
