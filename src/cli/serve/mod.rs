//! Serve command - runs the HTTP API

use std::net::SocketAddr;

use anyhow::ensure;
use tokio::net::TcpListener;
use tracing::info;

use crate::api::create_router_with_state;
use crate::config::AppConfig;

/// Run the API server
pub async fn run() -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    check_serve_config(&config)?;

    let state = crate::create_app_state_with_config(&config).await?;
    let app = create_router_with_state(state);

    let addr = build_socket_addr(&config)?;
    info!("Starting team membership service on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Refuse to accept tokens signed with the placeholder secret
fn check_serve_config(config: &AppConfig) -> anyhow::Result<()> {
    ensure!(
        !config.auth.has_default_secret(),
        "auth.jwt_secret still holds the default value; set APP__AUTH__JWT_SECRET"
    );
    Ok(())
}

fn build_socket_addr(config: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    )))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }

    info!("Shutdown signal received");
}
