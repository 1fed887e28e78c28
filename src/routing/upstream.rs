//! Upstream targets: reverse-proxied HTTP services and static file roots.
//!
//! # Responsibilities
//! - Forward requests to HTTP upstreams and stream the response back
//! - Serve files from a directory mounted under a path prefix
//! - Sign proxied requests when a signer is configured
//!
//! # Design Decisions
//! - The forwarded request keeps the full inbound request-URI
//! - Request bodies are buffered up to a limit; responses stream
//! - Upstream failures become 502, never a panic or a retry

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Instant;

use axum::body::Body;
use axum::http::header::{CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tower::ServiceExt;
use tower_http::services::ServeDir;
use url::{Position, Url};

use crate::observability::metrics;
use crate::routing::signer::RequestSigner;
use crate::security::headers::{append_forwarded_for, strip_hop_by_hop};

/// Response header naming the upstream that served the request.
pub const UPSTREAM_ADDRESS_HEADER: HeaderName = HeaderName::from_static("lap-upstream-address");

/// Shared forwarding settings.
#[derive(Debug, Clone)]
pub struct ForwardOptions {
    pub client: reqwest::Client,
    pub signer: Option<RequestSigner>,
    pub max_body_bytes: usize,
}

/// An `http`/`https` upstream.
#[derive(Debug, Clone)]
pub struct ReverseProxyTarget {
    origin: String,
    host: String,
    pass_host_header: bool,
}

impl ReverseProxyTarget {
    pub fn new(url: &Url, pass_host_header: bool) -> Self {
        Self {
            origin: url[..Position::BeforePath].to_string(),
            host: url[Position::BeforeHost..Position::AfterPort].to_string(),
            pass_host_header,
        }
    }

    /// `host[:port]` of the upstream.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub async fn forward(
        &self,
        request: Request<Body>,
        client_ip: Option<IpAddr>,
        options: &ForwardOptions,
        route: &str,
    ) -> Response {
        let start = Instant::now();
        let (mut parts, body) = request.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let target = format!("{}{}", self.origin, path_and_query);

        let body = match axum::body::to_bytes(body, options.max_body_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(upstream = %self.host, error = %e, "Request body rejected");
                return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
            }
        };

        let headers = &mut parts.headers;
        strip_hop_by_hop(headers);
        set_content_length(headers, &parts.method, body.len());
        if !self.pass_host_header {
            if let Ok(host) = HeaderValue::from_str(&self.host) {
                headers.insert(HOST, host);
            }
        }
        if let Some(ip) = client_ip {
            append_forwarded_for(headers, ip);
        }
        if let Some(signer) = &options.signer {
            if let Err(e) = signer.sign(&parts.method, &parts.uri, headers) {
                tracing::error!(upstream = %self.host, error = %e, "Failed to sign request");
                return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Error").into_response();
            }
        }

        tracing::debug!(upstream = %self.host, target = %target, "Forwarding request");

        let result = options
            .client
            .request(parts.method.clone(), &target)
            .headers(parts.headers)
            .body(body)
            .send()
            .await;

        let response = match result {
            Ok(upstream) => {
                let status = upstream.status();
                let mut headers = upstream.headers().clone();
                strip_hop_by_hop(&mut headers);
                let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
                *response.status_mut() = status;
                *response.headers_mut() = headers;
                response
            }
            Err(e) => {
                tracing::error!(upstream = %self.host, error = %e, "Upstream request failed");
                (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
            }
        };

        metrics::record_upstream(route, start);
        with_upstream_address(response, &self.host)
    }
}

/// A `file://` upstream.
#[derive(Debug, Clone)]
pub struct FileServerTarget {
    mount: String,
    root: PathBuf,
    service: ServeDir,
}

impl FileServerTarget {
    pub fn new(mount: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            mount: mount.into(),
            service: ServeDir::new(&root),
            root,
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    pub async fn serve(&self, request: Request<Body>, route: &str) -> Response {
        let start = Instant::now();
        let (mut parts, body) = request.into_parts();

        let rest = parts.uri.path().strip_prefix(self.mount.as_str()).unwrap_or("");
        let mut stripped = format!("/{}", rest.trim_start_matches('/'));
        if let Some(query) = parts.uri.query() {
            stripped.push('?');
            stripped.push_str(query);
        }
        parts.uri = match stripped.parse::<Uri>() {
            Ok(uri) => uri,
            Err(_) => return StatusCode::BAD_REQUEST.into_response(),
        };

        let response = match self.service.clone().oneshot(Request::from_parts(parts, body)).await {
            Ok(response) => response.map(Body::new),
            Err(never) => match never {},
        };

        metrics::record_upstream(route, start);
        let root = self.root.display().to_string();
        with_upstream_address(response, &root)
    }
}

/// The buffered body is sent with exactly this length, which the signature covers.
/// Bodiless GET and HEAD requests go out without the header.
fn set_content_length(headers: &mut HeaderMap, method: &Method, len: usize) {
    headers.remove(TRANSFER_ENCODING);
    if len == 0 && (*method == Method::GET || *method == Method::HEAD) {
        headers.remove(CONTENT_LENGTH);
    } else {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
    }
}

/// Upstream behavior selected by URL scheme.
#[derive(Debug, Clone)]
pub enum UpstreamTarget {
    Proxy(ReverseProxyTarget),
    Files(FileServerTarget),
}

fn with_upstream_address(mut response: Response, address: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(address) {
        response.headers_mut().insert(UPSTREAM_ADDRESS_HEADER, value);
    }
    response
}
