use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use meter_client::domain::{Account, MeterReading};
use time::OffsetDateTime;

use super::{AccountQuery, AccountStore, ReadingQuery, ReadingStore, StoreError};

/// In-memory account store.
///
/// Counts `get` calls so tests can assert the engine reads at most once.
/// Clones share the same underlying state.
#[derive(Clone, Default)]
pub struct InMemoryAccountStore {
    inner: Arc<AccountInner>,
}

#[derive(Default)]
struct AccountInner {
    accounts: Mutex<Vec<Account>>,
    reads: AtomicUsize,
}

impl InMemoryAccountStore {
    pub fn with_accounts(accounts: Vec<Account>) -> Self {
        Self {
            inner: Arc::new(AccountInner {
                accounts: Mutex::new(accounts),
                reads: AtomicUsize::new(0),
            }),
        }
    }

    pub fn read_count(&self) -> usize {
        self.inner.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn get(&self, query: AccountQuery) -> Result<Vec<Account>, StoreError> {
        self.inner.reads.fetch_add(1, Ordering::SeqCst);
        let accounts = self.inner.accounts.lock().expect("account store mutex poisoned");
        Ok(accounts
            .iter()
            .filter(|a| query.account_ids.contains(&a.account_id))
            .cloned()
            .collect())
    }
}

/// In-memory reading store with EF-style staged writes.
///
/// `add_range` stages, `save_changes` commits and stamps audit fields.
/// Read and write call counters back the call-count assertions in the
/// engine and endpoint tests. Clones share the same underlying state.
#[derive(Clone, Default)]
pub struct InMemoryReadingStore {
    inner: Arc<ReadingInner>,
}

#[derive(Default)]
struct ReadingInner {
    committed: Mutex<Vec<MeterReading>>,
    staged: Mutex<Vec<MeterReading>>,
    reads: AtomicUsize,
    add_range_calls: AtomicUsize,
    save_calls: AtomicUsize,
}

impl InMemoryReadingStore {
    /// A store pre-populated with already-committed readings. Seeding does
    /// not count against the write counters.
    pub fn with_readings(readings: Vec<MeterReading>) -> Self {
        let store = Self::default();
        *store.inner.committed.lock().expect("reading store mutex poisoned") = readings;
        store
    }

    pub fn read_count(&self) -> usize {
        self.inner.reads.load(Ordering::SeqCst)
    }

    pub fn add_range_count(&self) -> usize {
        self.inner.add_range_calls.load(Ordering::SeqCst)
    }

    pub fn save_count(&self) -> usize {
        self.inner.save_calls.load(Ordering::SeqCst)
    }

    pub fn committed(&self) -> Vec<MeterReading> {
        self.inner
            .committed
            .lock()
            .expect("reading store mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl ReadingStore for InMemoryReadingStore {
    async fn get(&self, query: ReadingQuery) -> Result<Vec<MeterReading>, StoreError> {
        self.inner.reads.fetch_add(1, Ordering::SeqCst);
        let committed = self.inner.committed.lock().expect("reading store mutex poisoned");
        Ok(committed
            .iter()
            .filter(|r| query.account_ids.contains(&r.account_id))
            .cloned()
            .collect())
    }

    async fn add_range(&self, readings: Vec<MeterReading>) -> Result<(), StoreError> {
        self.inner.add_range_calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .staged
            .lock()
            .expect("reading store mutex poisoned")
            .extend(readings);
        Ok(())
    }

    async fn save_changes(&self) -> Result<usize, StoreError> {
        self.inner.save_calls.fetch_add(1, Ordering::SeqCst);

        let now = OffsetDateTime::now_utc();
        let mut staged = self.inner.staged.lock().expect("reading store mutex poisoned");
        let mut committed = self.inner.committed.lock().expect("reading store mutex poisoned");

        let written = staged.len();
        for mut reading in staged.drain(..) {
            reading.created = Some(now);
            reading.updated = Some(now);
            committed.push(reading);
        }

        Ok(written)
    }
}
