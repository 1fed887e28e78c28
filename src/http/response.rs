//! Response helpers.
//!
//! # Responsibilities
//! - No-cache headers for the proxy's own endpoints
//! - Redirects and HTML responses
//!
//! # Design Decisions
//! - Proxied responses are passed through untouched apart from identity headers

use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, EXPIRES, LOCATION};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

const X_ACCEL_EXPIRES: HeaderName = HeaderName::from_static("x-accel-expires");

/// Forbid caching by browsers and intermediaries.
pub fn no_cache(headers: &mut HeaderMap) {
    headers.insert(EXPIRES, HeaderValue::from_static("Thu, 01 Jan 1970 00:00:00 UTC"));
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate, max-age=0"),
    );
    headers.insert(X_ACCEL_EXPIRES, HeaderValue::from_static("0"));
}

pub fn redirect(status: StatusCode, location: &str) -> Response {
    let mut response = status.into_response();
    match HeaderValue::from_str(location) {
        Ok(value) => {
            response.headers_mut().insert(LOCATION, value);
        }
        Err(_) => {
            response.headers_mut().insert(LOCATION, HeaderValue::from_static("/"));
        }
    }
    response
}

pub fn html(status: StatusCode, body: String) -> Response {
    let mut response = (status, body).into_response();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_cache_sets_all_headers() {
        let mut headers = HeaderMap::new();
        no_cache(&mut headers);
        assert!(headers.contains_key(EXPIRES));
        assert!(headers.contains_key(CACHE_CONTROL));
        assert_eq!(headers.get(X_ACCEL_EXPIRES).unwrap(), "0");
    }

    #[test]
    fn redirect_sets_location() {
        let response = redirect(StatusCode::FOUND, "/after");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/after");
    }
}
