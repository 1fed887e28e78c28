//! Router implementation.
//!
//! Routes are built once from the ordered upstream list and frozen. Lookup
//! returns the most specific matching mount path.

use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use url::Url;

use crate::routing::matcher::{Matcher, PathPattern};
use crate::routing::signer::RequestSigner;
use crate::routing::upstream::{FileServerTarget, ForwardOptions, ReverseProxyTarget, UpstreamTarget};

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("error parsing upstream {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unknown upstream protocol {scheme:?} in {url}")]
    UnknownScheme { scheme: String, url: String },

    #[error("upstream path {0:?} is registered twice")]
    DuplicatePrefix(String),

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),
}

/// A mounted upstream.
#[derive(Debug, Clone)]
pub struct UpstreamRoute {
    pub pattern: PathPattern,
    pub target: UpstreamTarget,
}

/// Settings applied to every upstream.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub pass_host_header: bool,
    pub signer: Option<RequestSigner>,
    pub max_body_bytes: usize,
    pub connect_timeout: Duration,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            pass_host_header: true,
            signer: None,
            max_body_bytes: 10 * 1024 * 1024,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// The upstream routing table.
#[derive(Debug)]
pub struct Router {
    routes: Vec<UpstreamRoute>,
    forward: ForwardOptions,
}

impl Router {
    /// Build the table from upstream URLs, in order.
    pub fn from_upstreams<S: AsRef<str>>(
        upstreams: &[S],
        options: RouterOptions,
    ) -> Result<Self, RouterError> {
        let mut routes = Vec::with_capacity(upstreams.len());
        let mut seen = HashSet::new();

        for raw in upstreams {
            let raw = raw.as_ref();
            let url = Url::parse(raw).map_err(|source| RouterError::InvalidUrl {
                url: raw.to_string(),
                source,
            })?;

            let route = match url.scheme() {
                "http" | "https" => {
                    let pattern = PathPattern::parse(url.path());
                    let target = ReverseProxyTarget::new(&url, options.pass_host_header);
                    tracing::info!(path = %pattern, upstream = %target.host(), "Mapping path to upstream");
                    UpstreamRoute {
                        pattern,
                        target: UpstreamTarget::Proxy(target),
                    }
                }
                "file" => {
                    let mount = url.fragment().filter(|f| !f.is_empty()).unwrap_or(url.path());
                    let pattern = PathPattern::parse(mount);
                    tracing::info!(path = %pattern, root = %url.path(), "Mapping path to file system");
                    UpstreamRoute {
                        target: UpstreamTarget::Files(FileServerTarget::new(pattern.as_str(), url.path())),
                        pattern,
                    }
                }
                other => {
                    return Err(RouterError::UnknownScheme {
                        scheme: other.to_string(),
                        url: raw.to_string(),
                    })
                }
            };

            if !seen.insert(route.pattern.clone()) {
                return Err(RouterError::DuplicatePrefix(route.pattern.to_string()));
            }
            routes.push(route);
        }

        let client = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()?;

        Ok(Self {
            routes,
            forward: ForwardOptions {
                client,
                signer: options.signer,
                max_body_bytes: options.max_body_bytes,
            },
        })
    }

    pub fn routes(&self) -> &[UpstreamRoute] {
        &self.routes
    }

    pub fn signer(&self) -> Option<&RequestSigner> {
        self.forward.signer.as_ref()
    }

    /// Most specific route whose pattern matches `path`.
    pub fn match_path(&self, path: &str) -> Option<&UpstreamRoute> {
        self.routes
            .iter()
            .filter(|route| route.pattern.matches(path))
            .max_by_key(|route| route.pattern.specificity())
    }

    /// Hand the request to its upstream; 404 when nothing matches.
    pub async fn forward(&self, request: Request<Body>, client_ip: Option<IpAddr>) -> Response {
        let path = request.uri().path().to_string();
        let Some(route) = self.match_path(&path) else {
            tracing::warn!(path = %path, "No route matched");
            return (StatusCode::NOT_FOUND, "404 page not found").into_response();
        };

        let label = route.pattern.as_str();
        match &route.target {
            UpstreamTarget::Proxy(proxy) => proxy.forward(request, client_ip, &self.forward, label).await,
            UpstreamTarget::Files(files) => files.serve(request, label).await,
        }
    }
}
