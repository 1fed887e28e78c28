//! Request inspection helpers.
//!
//! # Responsibilities
//! - Request ID generation and propagation (`x-request-id`)
//! - Peer address, host and redirect-target extraction
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Client-supplied redirect targets are only honored when local

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::header::HOST;
use axum::http::{HeaderMap, HeaderName, Request};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Header a front proxy uses to say where to return after sign-in.
pub const X_AUTH_REQUEST_REDIRECT: HeaderName = HeaderName::from_static("x-auth-request-redirect");

pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Socket peer, when the server was started with connect info.
pub fn peer_addr(request: &Request<Body>) -> Option<SocketAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Host the client addressed, from `Host` or the absolute URI.
pub fn request_host(request: &Request<Body>) -> Option<String> {
    request
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.to_string()))
}

/// Path plus query, as sent by the client.
pub fn request_uri(request: &Request<Body>) -> String {
    request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}

pub fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Accept only local absolute paths; anything else becomes `/`.
pub fn safe_redirect(target: &str) -> &str {
    if target.starts_with('/') && !target.starts_with("//") {
        target
    } else {
        "/"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_must_be_local_path() {
        assert_eq!(safe_redirect("/private/page?x=1"), "/private/page?x=1");
        assert_eq!(safe_redirect(""), "/");
        assert_eq!(safe_redirect("//evil.example.com/"), "/");
        assert_eq!(safe_redirect("https://evil.example.com/"), "/");
        assert_eq!(safe_redirect("relative"), "/");
    }

    #[test]
    fn host_and_uri() {
        let request = Request::builder()
            .uri("/a/b?c=d")
            .header(HOST, "app.example.com:8443")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_host(&request).as_deref(), Some("app.example.com:8443"));
        assert_eq!(request_uri(&request), "/a/b?c=d");
        assert_eq!(peer_addr(&request), None);
        assert_eq!(request_id(request.headers()), "unknown");
    }
}
