use anyhow::{bail, Context, Result};
use readings_service::{
    config::AppConfig,
    csv_upload, observability,
    reconcile::ReadingReconciler,
    store::{PgAccountStore, PgReadingStore},
};
use sqlx::postgres::PgPoolOptions;
use std::{env, fs, time::Duration};

/// Run a readings CSV from disk through the same reconciliation path as the
/// HTTP upload endpoint, for operational backfills.
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: backfill_readings <csv_file_path>");
    }
    let file_path = &args[1];

    // Load configuration (can point READINGS_CONFIG to a backfill-specific file).
    let cfg = AppConfig::load()?;

    let bytes = fs::read(file_path).with_context(|| format!("failed to read {file_path}"))?;
    let batch = csv_upload::decode_readings(&bytes)?;
    let batch_len = batch.len();

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
    let reconciler = ReadingReconciler::new(accounts, readings);

    let persisted = reconciler.upload(batch).await?;
    tracing::info!(
        total = batch_len,
        persisted,
        skipped = batch_len - persisted,
        "backfill complete"
    );

    Ok(())
}
