pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use meter_client::domain::{Account, MeterReading};

pub use memory::{InMemoryAccountStore, InMemoryReadingStore};
pub use postgres::{PgAccountStore, PgReadingStore};

/// Typed query specification for accounts: "account_id in set".
///
/// This is the only predicate the reconciliation engine ever issues, so the
/// store contract carries a value object instead of an opaque predicate and
/// any backend can satisfy it.
#[derive(Debug, Clone, Default)]
pub struct AccountQuery {
    pub account_ids: Vec<i32>,
}

impl AccountQuery {
    pub fn for_ids(account_ids: Vec<i32>) -> Self {
        Self { account_ids }
    }
}

/// Typed query specification for readings: "account_id in set".
#[derive(Debug, Clone, Default)]
pub struct ReadingQuery {
    pub account_ids: Vec<i32>,
}

impl ReadingQuery {
    pub fn for_accounts(account_ids: Vec<i32>) -> Self {
        Self { account_ids }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get(&self, query: AccountQuery) -> Result<Vec<Account>, StoreError>;
}

/// Staged-write store for meter readings.
///
/// `add_range` only stages rows; nothing reaches the backend until
/// `save_changes` flushes the staged batch in one write. Audit fields are
/// stamped by the implementation at flush time.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    async fn get(&self, query: ReadingQuery) -> Result<Vec<MeterReading>, StoreError>;

    async fn add_range(&self, readings: Vec<MeterReading>) -> Result<(), StoreError>;

    /// Flush staged rows, returning how many were written.
    async fn save_changes(&self) -> Result<usize, StoreError>;
}
