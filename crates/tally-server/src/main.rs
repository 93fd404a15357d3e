//! tally-server
//!
//! - `POST /submit`: one JSON record per request
//! - `GET /metrics`: request count, in-flight, duration, size, bad-path series

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use tally_server::{app_state::AppState, config, router};

#[derive(Parser)]
#[command(name = "tally-server", about = "Telemetry ingestion server")]
struct Cli {
    /// Address to listen for HTTP requests (overrides the config file).
    #[arg(long, env = "TALLY_LISTEN_ADDRESS")]
    listen_address: Option<String>,

    /// Optional YAML configuration file.
    #[arg(long, env = "TALLY_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let mut cfg = match cli.config.as_deref() {
        Some(path) => match config::load_from_file(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, %path, "failed to load config");
                std::process::exit(1);
            }
        },
        None => config::ServerConfig::default(),
    };
    if let Some(addr) = cli.listen_address {
        cfg.server.listen_address = addr;
    }

    let listen = match cfg.server.listen_socket_addr() {
        Ok(a) => a,
        Err(e) => {
            tracing::error!(error = %e, "invalid listen address");
            std::process::exit(1);
        }
    };

    let state = match AppState::new(cfg) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };
    let app = router::build_router(state);

    let listener = match bind(listen).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, %listen, "failed to bind");
            std::process::exit(1);
        }
    };
    let listen = listener.local_addr().unwrap_or(listen);
    tracing::info!(%listen, "tally-server listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server failed");
        std::process::exit(1);
    }
}

/// Hosts without IPv6 fall back from `[::]` to `0.0.0.0`.
async fn bind(addr: SocketAddr) -> std::io::Result<tokio::net::TcpListener> {
    match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => Ok(l),
        Err(e) if addr.ip() == IpAddr::V6(Ipv6Addr::UNSPECIFIED) => {
            tracing::warn!(error = %e, "ipv6 wildcard unavailable, binding ipv4 only");
            tokio::net::TcpListener::bind((Ipv4Addr::UNSPECIFIED, addr.port())).await
        }
        Err(e) => Err(e),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("signal received, starting graceful shutdown");
}
