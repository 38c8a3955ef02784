use std::collections::{HashMap, HashSet};

use meter_client::domain::{MeterReading, READ_VALUE_MAX, READ_VALUE_MIN};
use time::OffsetDateTime;

use crate::store::{AccountQuery, AccountStore, ReadingQuery, ReadingStore, StoreError};

/// Decides which readings from an upload batch are persisted.
///
/// Filter order: intra-batch dedup, account existence, value range,
/// staleness, then a single staged write. Issues at most one account read,
/// one reading read and one add_range/save_changes pair per call regardless
/// of batch size, and raises no error kinds of its own — store failures
/// propagate unmodified.
pub struct ReadingReconciler<A, R> {
    accounts: A,
    readings: R,
}

impl<A, R> ReadingReconciler<A, R>
where
    A: AccountStore,
    R: ReadingStore,
{
    pub fn new(accounts: A, readings: R) -> Self {
        Self { accounts, readings }
    }

    /// Reconcile one upload batch and return how many readings were
    /// persisted. Rejected and duplicate candidates are dropped silently;
    /// callers derive the failed count from the original batch size.
    pub async fn upload(&self, batch: Vec<MeterReading>) -> Result<usize, StoreError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let batch_len = batch.len();
        let mut candidates = dedup_batch(batch);
        let duplicates = batch_len - candidates.len();
        if duplicates > 0 {
            metrics::counter!("reconcile_duplicates_dropped_total").increment(duplicates as u64);
        }

        // One existence query for every referenced account.
        let existing = self
            .accounts
            .get(AccountQuery::for_ids(referenced_accounts(&candidates)))
            .await?;
        let existing: HashSet<i32> = existing.into_iter().map(|a| a.account_id).collect();

        if existing.is_empty() {
            metrics::counter!("reconcile_unknown_account_total").increment(candidates.len() as u64);
            return Ok(0);
        }

        let before = candidates.len();
        candidates.retain(|r| existing.contains(&r.account_id));
        let unknown = before - candidates.len();
        if unknown > 0 {
            metrics::counter!("reconcile_unknown_account_total").increment(unknown as u64);
        }

        let before = candidates.len();
        candidates.retain(|r| (READ_VALUE_MIN..=READ_VALUE_MAX).contains(&r.read_value));
        let out_of_range = before - candidates.len();
        if out_of_range > 0 {
            metrics::counter!("reconcile_out_of_range_total").increment(out_of_range as u64);
        }

        if candidates.is_empty() {
            return Ok(0);
        }

        // One batched read covering every account still in play.
        let stored = self
            .readings
            .get(ReadingQuery::for_accounts(referenced_accounts(&candidates)))
            .await?;
        let latest = latest_per_account(&stored);

        let before = candidates.len();
        candidates.retain(|r| match latest.get(&r.account_id) {
            // Only strictly newer readings survive; re-sent rows are stale.
            Some(latest_ts) => r.reading_date_time > *latest_ts,
            // No stored readings for this account: no staleness floor.
            None => true,
        });
        let stale = before - candidates.len();
        if stale > 0 {
            metrics::counter!("reconcile_stale_total").increment(stale as u64);
        }

        if candidates.is_empty() {
            return Ok(0);
        }

        self.readings.add_range(candidates).await?;
        let persisted = self.readings.save_changes().await?;

        metrics::counter!("readings_persisted_total").increment(persisted as u64);
        tracing::debug!(batch_len, persisted, "upload batch reconciled");

        Ok(persisted)
    }
}

/// Collapse a batch to its distinct (account, timestamp, value) triples,
/// keeping the first occurrence of each.
fn dedup_batch(batch: Vec<MeterReading>) -> Vec<MeterReading> {
    let mut seen = HashSet::with_capacity(batch.len());
    let mut distinct = Vec::with_capacity(batch.len());
    for reading in batch {
        if seen.insert((reading.account_id, reading.reading_date_time, reading.read_value)) {
            distinct.push(reading);
        }
    }
    distinct
}

fn referenced_accounts(candidates: &[MeterReading]) -> Vec<i32> {
    let mut ids: Vec<i32> = candidates.iter().map(|r| r.account_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn latest_per_account(stored: &[MeterReading]) -> HashMap<i32, OffsetDateTime> {
    let mut latest = HashMap::new();
    for reading in stored {
        latest
            .entry(reading.account_id)
            .and_modify(|ts: &mut OffsetDateTime| {
                if reading.reading_date_time > *ts {
                    *ts = reading.reading_date_time;
                }
            })
            .or_insert(reading.reading_date_time);
    }
    latest
}
