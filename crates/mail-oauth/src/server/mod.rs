//! HTTP surface for the calling application.
//!
//! Exposes authorization URL creation, callback completion, refresh, revoke and
//! provider listing as JSON endpoints. Routing only: sessions, user records and
//! token persistence belong to the caller.

pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

pub use routes::create_router;

use crate::handler::OAuth2Handler;

/// Serve the OAuth routes until CTRL+C.
///
/// # Errors
///
/// Returns error on bind or server failure.
pub async fn run_http(handler: Arc<OAuth2Handler>, port: u16) -> anyhow::Result<()> {
    let router = create_router(Arc::clone(&handler));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(
        providers = ?handler.available_providers(),
        "OAuth server listening on http://{}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("OAuth server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
