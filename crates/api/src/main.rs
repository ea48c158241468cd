use anyhow::{Context, Result};
use chill_api::{build_app, ApiConfig};
use chill_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("chill_api");

    let config = ApiConfig::from_env();
    let bind = config.bind.clone();
    let app = build_app(config).await?;

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(bind = %bind, "eat & chill planner api started");

    axum::serve(listener, app).await?;
    Ok(())
}
