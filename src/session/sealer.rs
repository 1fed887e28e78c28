//! Session cookie sealing: payload encoding, optional encryption, signing.

use std::time::Duration;

use thiserror::Error;
use time::OffsetDateTime;

use crate::crypto::{CipherError, CookieCipher};
use crate::session::codec::{CookieCodec, CookieError};
use crate::session::state::{MalformedPayload, SessionState};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Cookie(#[from] CookieError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Payload(#[from] MalformedPayload),
}

/// A session recovered from a verified cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSession {
    pub session: SessionState,
    pub age: Duration,
}

/// Turns sessions into cookie values and back.
#[derive(Debug)]
pub struct SessionSealer {
    cookie_name: String,
    codec: CookieCodec,
    cipher: Option<CookieCipher>,
}

impl SessionSealer {
    pub fn new(cookie_name: impl Into<String>, codec: CookieCodec, cipher: Option<CookieCipher>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            codec,
            cipher,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn encrypts(&self) -> bool {
        self.cipher.is_some()
    }

    pub fn seal(&self, session: &SessionState, now: OffsetDateTime) -> Result<String, SessionError> {
        let plain = session.encode();
        let payload = match &self.cipher {
            Some(cipher) => cipher.encrypt(&plain)?,
            None => plain,
        };
        Ok(self.codec.sign(&self.cookie_name, &payload, now)?)
    }

    pub fn open(&self, token: &str, now: OffsetDateTime) -> Result<LoadedSession, SessionError> {
        let (payload, age) = self.codec.verify(&self.cookie_name, token, now)?;
        let plain = match &self.cipher {
            Some(cipher) => cipher.decrypt(&payload)?,
            None => payload,
        };
        let session = SessionState::decode(&plain)?;
        Ok(LoadedSession { session, age })
    }
}
