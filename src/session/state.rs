//! In-memory session state.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed session payload")]
pub struct MalformedPayload;

/// Identity carried by a verified cookie or a successful credential check.
///
/// Never stored server side: the next request sees it only through the
/// re-issued cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub user: String,
    pub email: Option<String>,
}

impl SessionState {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        let email = email.into();
        self.email = if email.is_empty() { None } else { Some(email) };
        self
    }

    /// The value placed in the trust header: email when known, else user.
    pub fn principal(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.user)
    }

    /// Plaintext payload: `email:<email> user:<user>`.
    pub fn encode(&self) -> String {
        format!(
            "email:{} user:{}",
            self.email.as_deref().unwrap_or_default(),
            self.user
        )
    }

    pub fn decode(payload: &str) -> Result<Self, MalformedPayload> {
        let rest = payload.strip_prefix("email:").ok_or(MalformedPayload)?;
        let (email, user) = rest.split_once(" user:").ok_or(MalformedPayload)?;
        if user.is_empty() {
            return Err(MalformedPayload);
        }
        Ok(SessionState::new(user).with_email(email))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.email {
            Some(email) => write!(f, "Session{{user:{} email:{}}}", self.user, email),
            None => write!(f, "Session{{user:{}}}", self.user),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_with_and_without_email() {
        let plain = SessionState::new("alice");
        assert_eq!(plain.encode(), "email: user:alice");
        assert_eq!(SessionState::decode(&plain.encode()).unwrap(), plain);

        let mailed = SessionState::new("bob").with_email("bob@example.com");
        assert_eq!(SessionState::decode(&mailed.encode()).unwrap(), mailed);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(SessionState::decode("user:alice").is_err());
        assert!(SessionState::decode("email:x@y.z user:").is_err());
        assert!(SessionState::decode("").is_err());
    }

    #[test]
    fn principal_prefers_email() {
        assert_eq!(SessionState::new("alice").principal(), "alice");
        assert_eq!(
            SessionState::new("alice").with_email("a@x.io").principal(),
            "a@x.io"
        );
    }
}
