use sqlx::{PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::domain::MeterReading;

/// Fetch all stored readings for the given accounts, newest first per account.
pub async fn readings_for_accounts(
    pool: &PgPool,
    account_ids: &[i32],
) -> Result<Vec<MeterReading>, sqlx::Error> {
    sqlx::query_as::<_, MeterReading>(
        r#"
        SELECT
            account_id,
            reading_date_time,
            read_value,
            created,
            updated
        FROM meter_readings
        WHERE account_id = ANY($1)
        ORDER BY account_id, reading_date_time DESC
        "#,
    )
    .bind(account_ids)
    .fetch_all(pool)
    .await
}

/// Insert a batch of readings in one transactional multi-row statement.
///
/// Audit fields are stamped here; whatever the caller put in `created` and
/// `updated` is ignored. Returns the number of rows written.
pub async fn insert_readings(
    pool: &PgPool,
    readings: &[MeterReading],
) -> Result<u64, sqlx::Error> {
    if readings.is_empty() {
        return Ok(0);
    }

    let now = OffsetDateTime::now_utc();

    let mut tx = pool.begin().await?;

    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO meter_readings (account_id, reading_date_time, read_value, created, updated) ",
    );
    builder.push_values(readings, |mut b, r| {
        b.push_bind(r.account_id)
            .push_bind(r.reading_date_time)
            .push_bind(r.read_value)
            .push_bind(now)
            .push_bind(now);
    });

    let result = builder.build().execute(&mut *tx).await?;
    tx.commit().await?;

    Ok(result.rows_affected())
}
