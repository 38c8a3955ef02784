use sqlx::PgPool;

use crate::domain::Account;

/// Fetch the accounts whose ids appear in `account_ids`.
///
/// Used by the upload path as an existence check: callers compare the
/// returned ids against the ids they asked for.
pub async fn accounts_by_ids(
    pool: &PgPool,
    account_ids: &[i32],
) -> Result<Vec<Account>, sqlx::Error> {
    sqlx::query_as::<_, Account>(
        r#"
        SELECT
            account_id,
            first_name,
            last_name,
            created,
            updated
        FROM accounts
        WHERE account_id = ANY($1)
        "#,
    )
    .bind(account_ids)
    .fetch_all(pool)
    .await
}
