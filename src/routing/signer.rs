//! Outbound request signing.
//!
//! Upstreams verify `LAP-Signature` to confirm a request came through the
//! proxy unaltered. The MAC covers the method, a fixed list of headers and
//! the request path with its query. The body is not covered, but its
//! length is, so sign only after `Content-Length` is final.

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use thiserror::Error;

use crate::crypto::{HashAlgorithm, InvalidKey, UnknownAlgorithm};

pub const SIGNATURE_HEADER: HeaderName = HeaderName::from_static("lap-signature");

/// Headers covered by the signature, in signing order.
pub const SIGNED_HEADERS: [&str; 10] = [
    "Content-Length",
    "Content-Md5",
    "Content-Type",
    "Date",
    "Authorization",
    "X-Forwarded-User",
    "X-Forwarded-Email",
    "X-Forwarded-Access-Token",
    "Cookie",
    "LAP-Auth",
];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignerError {
    #[error("signature key must be of the form algorithm:secret")]
    Format,

    #[error(transparent)]
    Algorithm(#[from] UnknownAlgorithm),

    #[error(transparent)]
    Key(#[from] InvalidKey),
}

#[derive(Clone)]
pub struct RequestSigner {
    algorithm: HashAlgorithm,
    key: Vec<u8>,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl RequestSigner {
    pub fn new(algorithm: HashAlgorithm, key: impl Into<Vec<u8>>) -> Self {
        Self {
            algorithm,
            key: key.into(),
        }
    }

    /// Parse `sha256:secret`.
    pub fn from_key_spec(spec: &str) -> Result<Self, SignerError> {
        let (algorithm, secret) = spec.split_once(':').ok_or(SignerError::Format)?;
        if secret.is_empty() {
            return Err(SignerError::Format);
        }
        Ok(Self::new(algorithm.parse()?, secret.as_bytes()))
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn string_to_sign(method: &Method, uri: &Uri, headers: &HeaderMap) -> String {
        let mut out = String::new();
        out.push_str(method.as_str());
        out.push('\n');
        for name in SIGNED_HEADERS {
            let values: Vec<&str> = headers
                .get_all(name)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .collect();
            out.push_str(&values.join(","));
            out.push('\n');
        }
        out.push_str(uri.path());
        if let Some(query) = uri.query().filter(|q| !q.is_empty()) {
            out.push('?');
            out.push_str(query);
        }
        out
    }

    /// Header value: `<algorithm> <base64url(mac)>`.
    pub fn signature(&self, method: &Method, uri: &Uri, headers: &HeaderMap) -> Result<String, SignerError> {
        let payload = Self::string_to_sign(method, uri, headers);
        let mac = self.algorithm.mac(&self.key, &[payload.as_bytes()])?;
        Ok(format!("{} {}", self.algorithm.name(), URL_SAFE.encode(mac)))
    }

    /// Attach the signature header, replacing any existing one.
    pub fn sign(&self, method: &Method, uri: &Uri, headers: &mut HeaderMap) -> Result<(), SignerError> {
        headers.remove(SIGNATURE_HEADER);
        let signature = self.signature(method, uri, headers)?;
        if let Ok(value) = HeaderValue::from_str(&signature) {
            headers.insert(SIGNATURE_HEADER, value);
        }
        Ok(())
    }

    /// Check a request signed by a peer holding the same key.
    pub fn verify(&self, method: &Method, uri: &Uri, headers: &HeaderMap) -> bool {
        let Some(header) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
            return false;
        };
        let Some((algorithm, encoded)) = header.split_once(' ') else {
            return false;
        };
        if algorithm != self.algorithm.name() {
            return false;
        }
        let Ok(tag) = URL_SAFE.decode(encoded) else {
            return false;
        };
        let payload = Self::string_to_sign(method, uri, headers);
        self.algorithm.verify(&self.key, &[payload.as_bytes()], &tag)
    }
}
