//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the dispatch handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener
//! - Drain in-flight requests on shutdown

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::auth::{AuthEngine, SignInService, TrustHeaderOptions};
use crate::http::cookies::CookieSettings;
use crate::http::handlers::{dispatch, SystemPaths};
use crate::http::pages::PageRenderer;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::observability::tracing::make_request_span;
use crate::routing::Router as ProxyRouter;
use crate::security::Whitelist;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<SystemPaths>,
    pub engine: Arc<AuthEngine>,
    pub sign_in: Arc<SignInService>,
    pub whitelist: Arc<Whitelist>,
    pub router: Arc<ProxyRouter>,
    pub cookies: Arc<CookieSettings>,
    pub trust: Arc<TrustHeaderOptions>,
    pub pages: Arc<dyn PageRenderer>,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server around prepared state.
    pub fn new(state: AppState, request_timeout: Duration) -> Self {
        Self {
            router: Self::build_router(state, request_timeout),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, request_timeout: Duration) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
            .layer(set_request_id_layer())
    }

    /// The assembled router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
