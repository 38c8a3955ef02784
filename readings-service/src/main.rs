use anyhow::Result;
use readings_service::{
    config::AppConfig,
    http::{self, AppState},
    metrics_server, observability,
    store::{PgAccountStore, PgReadingStore},
};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;

    let accounts = PgAccountStore::new(pool.clone());
    let readings = PgReadingStore::new(
        pool,
        cfg.store.max_retries,
        Duration::from_millis(cfg.store.retry_backoff_ms),
    );
    let state = Arc::new(AppState::new(accounts, readings));

    let addr: SocketAddr = cfg
        .http
        .bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid http.bind_addr: {e}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "meter readings upload service listening");

    axum::serve(listener, http::build_router(state).into_make_service()).await?;

    Ok(())
}
