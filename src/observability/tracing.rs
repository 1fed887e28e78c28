//! Request spans.
//!
//! # Responsibilities
//! - Create one span per request carrying method, path and request ID
//!
//! # Design Decisions
//! - The request ID is read from `x-request-id`, set by the request-id layer
//! - Query strings stay out of spans

use axum::body::Body;
use axum::http::Request;
use tracing::Span;

use crate::http::request::request_id;

/// `make_span_with` callback for `TraceLayer`.
pub fn make_request_span(request: &Request<Body>) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id(request.headers()),
    )
}
