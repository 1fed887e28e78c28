//! Identity headers added to authenticated requests and responses.

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::session::SessionState;

/// Trust header carrying the authenticated principal.
pub const TRUST_HEADER: HeaderName = HeaderName::from_static("lap-auth");
pub const X_FORWARDED_USER: HeaderName = HeaderName::from_static("x-forwarded-user");
pub const X_FORWARDED_EMAIL: HeaderName = HeaderName::from_static("x-forwarded-email");
pub const X_AUTH_REQUEST_USER: HeaderName = HeaderName::from_static("x-auth-request-user");
pub const X_AUTH_REQUEST_EMAIL: HeaderName = HeaderName::from_static("x-auth-request-email");

/// Which identity headers to emit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustHeaderOptions {
    /// Forward `Authorization: Basic user:<basic_auth_password>` upstream.
    pub pass_basic_auth: bool,
    pub basic_auth_password: String,
    pub pass_user_headers: bool,
    /// Add `X-Auth-Request-*` to the response (for `auth_request` setups).
    pub set_xauthrequest: bool,
}

/// Remove identity headers a client could have forged.
pub fn strip_identity(headers: &mut HeaderMap) {
    headers.remove(TRUST_HEADER);
}

/// Write the session identity into the outbound request and the response.
pub fn inject_identity(
    session: &SessionState,
    options: &TrustHeaderOptions,
    request: &mut HeaderMap,
    response: &mut HeaderMap,
) {
    let user = header_value(&session.user);
    let email = session.email.as_deref().and_then(header_value);

    if options.pass_basic_auth {
        let credentials = format!("{}:{}", session.user, options.basic_auth_password);
        if let Some(value) = header_value(&format!("Basic {}", STANDARD.encode(credentials))) {
            request.insert(AUTHORIZATION, value);
        }
    }

    if options.pass_basic_auth || options.pass_user_headers {
        set_or_remove(request, X_FORWARDED_USER, user.clone());
        set_or_remove(request, X_FORWARDED_EMAIL, email.clone());
    }

    if options.set_xauthrequest {
        set_or_remove(response, X_AUTH_REQUEST_USER, user);
        set_or_remove(response, X_AUTH_REQUEST_EMAIL, email);
    }

    let principal = header_value(session.principal());
    set_or_remove(request, TRUST_HEADER, principal.clone());
    set_or_remove(response, TRUST_HEADER, principal);
}

fn header_value(value: &str) -> Option<HeaderValue> {
    if value.is_empty() {
        return None;
    }
    HeaderValue::from_str(value).ok()
}

fn set_or_remove(headers: &mut HeaderMap, name: HeaderName, value: Option<HeaderValue>) {
    match value {
        Some(value) => {
            headers.insert(name, value);
        }
        None => {
            headers.remove(name);
        }
    }
}
