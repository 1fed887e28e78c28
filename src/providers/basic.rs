//! HTTP Basic credentials checked against the local credential file.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

use crate::providers::{CredentialProvider, HtpasswdFile, Identity};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BasicAuthError {
    #[error("invalid Authorization header: expected Basic scheme")]
    WrongScheme,

    #[error("invalid Authorization header: credentials are not valid base64")]
    BadEncoding,

    #[error("invalid Authorization header: credentials lack ':' delimiter")]
    MissingDelimiter,

    #[error("{0} not in htpasswd file")]
    Rejected(String),
}

/// Decode `Basic <base64(user:password)>`.
pub fn parse_basic_auth(header: &str) -> Result<(String, String), BasicAuthError> {
    let (scheme, encoded) = header.split_once(' ').ok_or(BasicAuthError::WrongScheme)?;
    if scheme != "Basic" {
        return Err(BasicAuthError::WrongScheme);
    }
    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| BasicAuthError::BadEncoding)?;
    let decoded = String::from_utf8(decoded).map_err(|_| BasicAuthError::BadEncoding)?;
    let (user, password) = decoded
        .split_once(':')
        .ok_or(BasicAuthError::MissingDelimiter)?;
    Ok((user.to_string(), password.to_string()))
}

/// Basic-Auth fallback used when no session cookie is present.
#[derive(Debug, Clone)]
pub struct BasicAuthProvider {
    file: Arc<HtpasswdFile>,
}

impl BasicAuthProvider {
    pub fn new(file: Arc<HtpasswdFile>) -> Self {
        Self { file }
    }

    /// Check an `Authorization` header value.
    pub async fn authenticate_header(&self, header: &str) -> Result<Identity, BasicAuthError> {
        let (user, password) = parse_basic_auth(header)?;
        if self.file.validate(&user, &password).await {
            tracing::info!(user = %user, "Authenticated via basic auth");
            Ok(Identity::user(user))
        } else {
            Err(BasicAuthError::Rejected(user))
        }
    }
}

#[async_trait]
impl CredentialProvider for BasicAuthProvider {
    fn name(&self) -> &'static str {
        "basic"
    }

    async fn authenticate(&self, user: &str, secret: &str) -> Option<Identity> {
        self.file.validate(user, secret).await.then(|| Identity::user(user))
    }
}
