use time::OffsetDateTime;

/// Lowest meter register value accepted for persistence.
pub const READ_VALUE_MIN: i32 = 0;
/// Highest meter register value accepted for persistence (five digits).
pub const READ_VALUE_MAX: i32 = 99999;

/// A single meter totalizer reading for one account.
///
/// `reading_date_time` is an absolute instant; CSV input carries no offset
/// and is assumed UTC at decode time. `created`/`updated` are audit fields
/// stamped by the storage layer on insert, never by callers.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct MeterReading {
    pub account_id: i32,
    pub reading_date_time: OffsetDateTime,
    pub read_value: i32,
    pub created: Option<OffsetDateTime>,
    pub updated: Option<OffsetDateTime>,
}

impl MeterReading {
    /// An unsaved candidate reading with audit fields unset.
    pub fn candidate(account_id: i32, reading_date_time: OffsetDateTime, read_value: i32) -> Self {
        Self {
            account_id,
            reading_date_time,
            read_value,
            created: None,
            updated: None,
        }
    }
}
