//! Request dispatch.
//!
//! # Responsibilities
//! - Serve the proxy's own endpoints (robots, ping, sign_in, sign_out, auth)
//! - Send whitelisted requests straight upstream
//! - Authenticate everything else before proxying
//!
//! # Design Decisions
//! - One fallback handler owns the dispatch order
//! - Cookie effects from the engine are applied here, nowhere else
//! - The proxy's own endpoints are never cached

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{FromRequest, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::auth::{inject_identity, strip_identity, AuthDecision, AuthOutcome, AuthRequest, SignInOutcome};
use crate::http::cookies;
use crate::http::pages::{ErrorPage, SignInPage};
use crate::http::request::{
    header_str, peer_addr, request_host, request_uri, safe_redirect, X_AUTH_REQUEST_REDIRECT,
};
use crate::http::response::{html, no_cache, redirect};
use crate::http::server::AppState;
use crate::observability::metrics;

pub const ROBOTS_PATH: &str = "/robots.txt";
pub const PING_PATH: &str = "/ping";

/// Endpoints under the configured prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPaths {
    pub prefix: String,
    pub sign_in: String,
    pub sign_out: String,
    pub auth: String,
}

impl SystemPaths {
    pub fn new(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        Self {
            prefix: prefix.to_string(),
            sign_in: format!("{prefix}/sign_in"),
            sign_out: format!("{prefix}/sign_out"),
            auth: format!("{prefix}/auth"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RedirectQuery {
    rd: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SignInForm {
    username: String,
    password: String,
    rd: String,
}

/// Fallback handler for every request.
pub async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let path = request.uri().path().to_string();
    let peer = peer_addr(&request);

    let (kind, response) = if path == ROBOTS_PATH {
        ("robots", uncached(robots()))
    } else if path == PING_PATH {
        ("ping", uncached(ping()))
    } else if state
        .whitelist
        .is_bypassed(request.method(), &path, request.headers(), peer)
    {
        ("bypass", bypass(&state, request, peer).await)
    } else if path == state.paths.sign_in {
        ("sign_in", uncached(sign_in(&state, request, peer).await))
    } else if path == state.paths.sign_out {
        ("sign_out", uncached(sign_out(&state, &request)))
    } else if path == state.paths.auth {
        ("auth", uncached(auth_only(&state, request, peer).await))
    } else {
        ("proxy", proxy(&state, request, peer).await)
    };

    metrics::record_request(kind, response.status().as_u16());
    response
}

fn uncached(mut response: Response) -> Response {
    no_cache(response.headers_mut());
    response
}

fn robots() -> Response {
    (StatusCode::OK, "User-agent: *\nDisallow: /").into_response()
}

fn ping() -> Response {
    (StatusCode::OK, "OK").into_response()
}

async fn bypass(state: &AppState, mut request: Request<Body>, peer: Option<SocketAddr>) -> Response {
    strip_identity(request.headers_mut());
    state.router.forward(request, peer.map(|p| p.ip())).await
}

async fn sign_in(state: &AppState, request: Request<Body>, peer: Option<SocketAddr>) -> Response {
    let remote = state.whitelist.resolver().describe(request.headers(), peer);
    let host = request_host(&request);
    let is_post = request.method() == Method::POST;
    let header_redirect = header_str(request.headers(), &X_AUTH_REQUEST_REDIRECT).map(str::to_string);

    let query_rd = Query::<RedirectQuery>::try_from_uri(request.uri())
        .map(|Query(q)| q.rd)
        .unwrap_or_default();
    // Non-form bodies are treated as empty credentials.
    let mut form = match Form::<SignInForm>::from_request(request, &()).await {
        Ok(Form(form)) => form,
        Err(e) => {
            tracing::debug!(remote = %remote, error = %e, "Unreadable sign-in form");
            SignInForm::default()
        }
    };
    if form.rd.is_empty() {
        form.rd = query_rd;
    }
    let destination = safe_redirect(&form.rd).to_string();
    let page_redirect = header_redirect.unwrap_or_else(|| destination.clone());

    if !is_post || form.username.is_empty() {
        return sign_in_page(state, StatusCode::OK, &page_redirect, false, host.as_deref());
    }

    match state.sign_in.sign_in(&form.username, &form.password, &remote).await {
        SignInOutcome::Authenticated(session) => {
            let now = OffsetDateTime::now_utc();
            match state.engine.sealer().seal(&session, now) {
                Ok(value) => {
                    let mut response = redirect(StatusCode::FOUND, &destination);
                    let cookie = state.cookies.session_cookie(value, host.as_deref(), now);
                    cookies::append(response.headers_mut(), &cookie);
                    response
                }
                Err(e) => {
                    tracing::error!(remote = %remote, user = %form.username, error = %e, "Failed to save session");
                    error_page(state, StatusCode::INTERNAL_SERVER_ERROR, "Internal Error", "Internal Error")
                }
            }
        }
        SignInOutcome::Failed => sign_in_page(state, StatusCode::OK, &page_redirect, true, host.as_deref()),
        SignInOutcome::Denied => {
            sign_in_page(state, StatusCode::UNAUTHORIZED, &page_redirect, true, host.as_deref())
        }
    }
}

fn sign_out(state: &AppState, request: &Request<Body>) -> Response {
    let host = request_host(request);
    let mut response = redirect(StatusCode::TEMPORARY_REDIRECT, "/");
    let cookie = state
        .cookies
        .cleared_cookie(host.as_deref(), OffsetDateTime::now_utc());
    cookies::append(response.headers_mut(), &cookie);
    response
}

async fn auth_only(state: &AppState, request: Request<Body>, peer: Option<SocketAddr>) -> Response {
    let now = OffsetDateTime::now_utc();
    let host = request_host(&request);
    let outcome = authenticate(state, request.headers(), peer, now).await;

    let mut response = match &outcome.decision {
        AuthDecision::Accept(session) => {
            let mut response = StatusCode::ACCEPTED.into_response();
            let mut forwarded = HeaderMap::new();
            inject_identity(session, &state.trust, &mut forwarded, response.headers_mut());
            response
        }
        AuthDecision::Reject | AuthDecision::InternalError => {
            (StatusCode::UNAUTHORIZED, "unauthorized request").into_response()
        }
    };
    state
        .cookies
        .apply(&outcome.effects, host.as_deref(), now, response.headers_mut());
    response
}

async fn proxy(state: &AppState, request: Request<Body>, peer: Option<SocketAddr>) -> Response {
    let now = OffsetDateTime::now_utc();
    let host = request_host(&request);
    let outcome = authenticate(state, request.headers(), peer, now).await;

    match outcome.decision {
        AuthDecision::InternalError => {
            uncached(error_page(state, StatusCode::INTERNAL_SERVER_ERROR, "Internal Error", "Internal Error"))
        }
        AuthDecision::Reject => {
            let target = header_str(request.headers(), &X_AUTH_REQUEST_REDIRECT)
                .map(str::to_string)
                .unwrap_or_else(|| request_uri(&request));
            let target = if target == state.paths.sign_in { "/".to_string() } else { target };
            uncached(sign_in_page(state, StatusCode::FORBIDDEN, &target, false, host.as_deref()))
        }
        AuthDecision::Accept(session) => {
            let (mut parts, body) = request.into_parts();
            strip_identity(&mut parts.headers);
            let mut identity = HeaderMap::new();
            inject_identity(&session, &state.trust, &mut parts.headers, &mut identity);

            let request = Request::from_parts(parts, body);
            let mut response = state.router.forward(request, peer.map(|p| p.ip())).await;
            for (name, value) in identity.iter() {
                response.headers_mut().insert(name.clone(), value.clone());
            }
            state
                .cookies
                .apply(&outcome.effects, host.as_deref(), now, response.headers_mut());
            response
        }
    }
}

async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    now: OffsetDateTime,
) -> AuthOutcome {
    let remote = state.whitelist.resolver().describe(headers, peer);
    let cookie = state.cookies.read(headers);
    let request = AuthRequest {
        cookie: cookie.as_deref(),
        authorization: header_str(headers, &AUTHORIZATION),
        remote: &remote,
    };
    let outcome = state.engine.authenticate(&request, now).await;
    metrics::record_auth_decision(match outcome.decision {
        AuthDecision::Accept(_) => "accept",
        AuthDecision::Reject => "reject",
        AuthDecision::InternalError => "internal_error",
    });
    outcome
}

/// Sign-in form; always expires the session cookie.
fn sign_in_page(
    state: &AppState,
    status: StatusCode,
    redirect: &str,
    failed: bool,
    host: Option<&str>,
) -> Response {
    let body = state.pages.sign_in(&SignInPage { redirect, failed });
    let mut response = html(status, body);
    let cookie = state.cookies.cleared_cookie(host, OffsetDateTime::now_utc());
    cookies::append(response.headers_mut(), &cookie);
    response
}

fn error_page(state: &AppState, status: StatusCode, title: &str, message: &str) -> Response {
    tracing::info!(status = status.as_u16(), title = %title, message = %message, "Rendering error page");
    let body = state.pages.error(&ErrorPage { status, title, message });
    html(status, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_paths_follow_prefix() {
        let paths = SystemPaths::new("/oauth2/");
        assert_eq!(paths.sign_in, "/oauth2/sign_in");
        assert_eq!(paths.sign_out, "/oauth2/sign_out");
        assert_eq!(paths.auth, "/oauth2/auth");
    }
}
