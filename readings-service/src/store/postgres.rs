use std::time::Duration;

use async_trait::async_trait;
use meter_client::{
    db::{account_queries, meter_reading_queries},
    domain::{Account, MeterReading},
};
use sqlx::PgPool;
use tokio::sync::Mutex;

use super::{AccountQuery, AccountStore, ReadingQuery, ReadingStore, StoreError};

#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn get(&self, query: AccountQuery) -> Result<Vec<Account>, StoreError> {
        let accounts = account_queries::accounts_by_ids(&self.pool, &query.account_ids).await?;
        Ok(accounts)
    }
}

/// Postgres-backed reading store with staged writes.
///
/// Staged rows are flushed by `save_changes` in a single transactional
/// multi-row insert. Flush failures are retried with linear backoff up to
/// `max_retries` times; the insert runs in one transaction, so a failed
/// attempt leaves nothing behind.
pub struct PgReadingStore {
    pool: PgPool,
    staged: Mutex<Vec<MeterReading>>,
    max_retries: u32,
    retry_backoff: Duration,
}

impl Clone for PgReadingStore {
    /// A clone is a fresh unit of work: same pool, empty staging buffer.
    fn clone(&self) -> Self {
        Self::new(self.pool.clone(), self.max_retries, self.retry_backoff)
    }
}

impl PgReadingStore {
    pub fn new(pool: PgPool, max_retries: u32, retry_backoff: Duration) -> Self {
        Self {
            pool,
            staged: Mutex::new(Vec::new()),
            max_retries,
            retry_backoff,
        }
    }

    async fn flush(&self, batch: &[MeterReading]) -> Result<usize, StoreError> {
        let mut attempt: u32 = 0;
        loop {
            match meter_reading_queries::insert_readings(&self.pool, batch).await {
                Ok(written) => {
                    let counter = metrics::counter!("readings_store_written_total");
                    counter.increment(written);
                    return Ok(written as usize);
                }
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    let sleep_for = self.retry_backoff * attempt;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        "reading store flush failed, retrying with backoff"
                    );
                    tokio::time::sleep(sleep_for).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "reading store flush failed, giving up");
                    metrics::counter!("readings_store_errors_total").increment(1);
                    return Err(StoreError::Database(e));
                }
            }
        }
    }
}

#[async_trait]
impl ReadingStore for PgReadingStore {
    async fn get(&self, query: ReadingQuery) -> Result<Vec<MeterReading>, StoreError> {
        let readings =
            meter_reading_queries::readings_for_accounts(&self.pool, &query.account_ids).await?;
        Ok(readings)
    }

    async fn add_range(&self, readings: Vec<MeterReading>) -> Result<(), StoreError> {
        self.staged.lock().await.extend(readings);
        Ok(())
    }

    async fn save_changes(&self) -> Result<usize, StoreError> {
        let batch: Vec<MeterReading> = {
            let mut staged = self.staged.lock().await;
            staged.drain(..).collect()
        };

        if batch.is_empty() {
            return Ok(0);
        }

        self.flush(&batch).await
    }
}
