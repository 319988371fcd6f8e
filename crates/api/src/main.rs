//! Trellis calendar aggregation service
//!
//! Main entry point for the HTTP server.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use trellis_api::{build_router, AppContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match dotenvy::dotenv() {
        Ok(path) => tracing::info!(path = %path.display(), "loaded .env"),
        Err(_) => tracing::debug!("no .env file found"),
    }

    let config = trellis_infra::config::load()?;
    let bind_addr = config.server.bind_addr.clone();

    let ctx = Arc::new(AppContext::new(config)?);
    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "trellis-api listening");
    axum::serve(listener, app).await?;

    Ok(())
}
