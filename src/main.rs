//! LDAP Auth Proxy
//!
//! An authenticating reverse proxy built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ http::handlers ──┬──▶ system endpoints
//!                                                       │    (robots, ping, sign_in, sign_out, auth)
//!                                                       │
//!                                                       ├──▶ security::whitelist ──────────┐
//!                                                       │                                  │
//!                                                       └──▶ auth::engine                  │
//!                                                              │  session cookie           │
//!                                                              │  basic auth (htpasswd)    │
//!                                                              ▼                           ▼
//!                                                        auth::headers ──▶ routing::router ──▶ upstream
//!
//!     sign_in ──▶ auth::sign_in ──▶ providers (htpasswd, LDAP) ──▶ session::sealer ──▶ cookie
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use ldap_auth_proxy::config::{load_config, loader::validated, ProxyConfig};
use ldap_auth_proxy::lifecycle::shutdown_signal;
use ldap_auth_proxy::observability::{logging, metrics};
use ldap_auth_proxy::{HttpServer, Shutdown, Startup};

#[derive(Parser)]
#[command(name = "ldap-auth-proxy")]
#[command(about = "Reverse proxy that authenticates users against htpasswd and LDAP", long_about = None)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long, env = "LAP_CONFIG")]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }
    let config = validated(config)?;

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ldap-auth-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstreams = config.proxy.upstreams.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.listener.bind_address.clone();
    let request_timeout = Duration::from_secs(config.timeouts.request_secs);
    let state = Startup::new(config).build()?;

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let drained = shutdown.wait();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    HttpServer::new(state, request_timeout)
        .run(listener, drained)
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
