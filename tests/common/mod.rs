//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http_body_util::BodyExt;
use sha1::{Digest, Sha1};
use tempfile::NamedTempFile;
use tokio::net::TcpListener;

use ldap_auth_proxy::routing::RequestSigner;
use ldap_auth_proxy::providers::{DirectoryClient, DirectoryConnector, DirectoryEntry, DirectoryError};
use ldap_auth_proxy::{HttpServer, ProxyConfig, Startup};

pub const SECRET: &str = "integration-test-cookie-secret";
pub const COOKIE_NAME: &str = "_ldap_proxy";

/// Start a backend that answers every request with its method, path and
/// headers, one `name: value` per line.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = axum::Router::new().fallback(|request: Request<Body>| async move {
        let mut body = format!("{} {}\n", request.method(), request.uri());
        for (name, value) in request.headers() {
            body.push_str(&format!("{}: {}\n", name, value.to_str().unwrap_or("<binary>")));
        }
        body
    });

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start a backend that checks `LAP-Signature` with `signer` and reports
/// `verified=<bool>`, the received content length and the body.
pub async fn start_verifying_backend(signer: RequestSigner) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let signer = Arc::new(signer);

    let app = axum::Router::new().fallback(move |request: Request<Body>| {
        let signer = signer.clone();
        async move {
            let (parts, body) = request.into_parts();
            let verified = signer.verify(&parts.method, &parts.uri, &parts.headers);
            let length = parts
                .headers
                .get("content-length")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("none")
                .to_string();
            let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
            format!(
                "verified={verified}\ncontent-length={length}\nbody={}\n",
                String::from_utf8_lossy(&body)
            )
        }
    });

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// A minimal valid configuration proxying `/` to `upstream`.
pub fn config(upstream: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.cookie.secret = SECRET.to_string();
    config.cookie.secure = false;
    config.proxy.upstreams = vec![format!("http://{upstream}/")];
    config
}

/// htpasswd file holding `alice:wonderland` as a `{SHA}` entry.
pub fn htpasswd_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    let digest = STANDARD.encode(Sha1::digest(b"wonderland"));
    writeln!(file, "alice:{{SHA}}{digest}").unwrap();
    file
}

/// Directory with one user, `carol` / `ldap-pass`, in groups `eng` and `ops`.
pub struct MockDirectory;

struct MockClient;

#[async_trait]
impl DirectoryClient for MockClient {
    async fn authenticate(
        &mut self,
        user: &str,
        password: &str,
    ) -> Result<Option<DirectoryEntry>, DirectoryError> {
        if user == "carol" && password == "ldap-pass" {
            let mut attributes = HashMap::new();
            attributes.insert("mail".to_string(), vec!["carol@example.com".to_string()]);
            Ok(Some(DirectoryEntry {
                dn: "uid=carol,ou=people,dc=example,dc=com".to_string(),
                attributes,
            }))
        } else {
            Ok(None)
        }
    }

    async fn groups_of_user(&mut self, _dn: &str) -> Result<Vec<String>, DirectoryError> {
        Ok(vec!["eng".to_string(), "ops".to_string()])
    }

    async fn close(&mut self) {}
}

#[async_trait]
impl DirectoryConnector for MockDirectory {
    async fn connect(&self) -> Result<Box<dyn DirectoryClient>, DirectoryError> {
        Ok(Box::new(MockClient))
    }
}

/// Build the in-process router for `config`, wired to [`MockDirectory`].
pub fn app(config: ProxyConfig) -> axum::Router {
    let state = Startup::new(config)
        .directory(Arc::new(MockDirectory))
        .build()
        .unwrap();
    HttpServer::new(state, Duration::from_secs(30)).router()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// `name=value` of the first `Set-Cookie` for the session cookie.
pub fn session_cookie<B>(response: &Response<B>) -> Option<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{COOKIE_NAME}=")))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub fn form_post(path: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("host", "app.example.com")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(path: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .header("host", "app.example.com")
        .body(Body::empty())
        .unwrap()
}
