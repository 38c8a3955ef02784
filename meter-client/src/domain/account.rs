use time::OffsetDateTime;

/// A billing account a meter reading can be recorded against.
///
/// Names are display-only; the upload path only ever asks whether an
/// `account_id` exists.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    pub account_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub created: Option<OffsetDateTime>,
    pub updated: Option<OffsetDateTime>,
}
