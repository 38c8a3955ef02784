use std::sync::Arc;

use axum::{
    extract::{
        multipart::{Multipart, MultipartRejection},
        DefaultBodyLimit, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    csv_upload::{decode_readings, CsvDecodeError},
    reconcile::ReadingReconciler,
    store::{AccountStore, ReadingStore, StoreError},
};

const FILE_FIELD: &str = "file";
const NO_CSV_MESSAGE: &str = "Csv file was not provided!";
const INTERNAL_MESSAGE: &str = "An internal server error occurred.";

/// Uploaded CSVs larger than this are rejected outright.
const MAX_UPLOAD_BYTES: usize = 8 * 1024 * 1024;

pub struct AppState<A, R> {
    pub accounts: A,
    pub readings: R,
}

impl<A, R> AppState<A, R> {
    pub fn new(accounts: A, readings: R) -> Self {
        Self { accounts, readings }
    }
}

pub fn build_router<A, R>(state: Arc<AppState<A, R>>) -> Router
where
    A: AccountStore + Clone + 'static,
    R: ReadingStore + Clone + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/meter-readings/uploads", post(upload_readings::<A, R>))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: usize,
    pub failed: usize,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn upload_readings<A, R>(
    State(state): State<Arc<AppState<A, R>>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError>
where
    A: AccountStore + Clone + 'static,
    R: ReadingStore + Clone + 'static,
{
    metrics::counter!("upload_requests_total").increment(1);

    // A non-multipart request never reaches the decoder.
    let multipart = multipart.map_err(|_| ApiError::bad_request(NO_CSV_MESSAGE))?;
    let csv_bytes = read_file_field(multipart).await?;

    let batch = decode_readings(&csv_bytes)?;
    let batch_len = batch.len();

    // Request-scoped unit of work: store clones share the backend but not
    // write staging, so concurrent uploads cannot flush each other's rows.
    let reconciler = ReadingReconciler::new(state.accounts.clone(), state.readings.clone());
    let success = reconciler.upload(batch).await?;

    // Failed is counted against the raw batch, so intra-batch duplicates
    // count as failures from the caller's point of view.
    Ok(Json(UploadResponse {
        success,
        failed: batch_len - success,
    }))
}

async fn read_file_field(mut multipart: Multipart) -> Result<axum::body::Bytes, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request(NO_CSV_MESSAGE))?
    {
        if field.name() == Some(FILE_FIELD) {
            return field
                .bytes()
                .await
                .map_err(|_| ApiError::bad_request(NO_CSV_MESSAGE));
        }
    }

    Err(ApiError::bad_request(NO_CSV_MESSAGE))
}

/// Error surfaced to HTTP clients.
///
/// Every response body carries a fresh correlation id and a
/// `"<status> : <message>"` string; internal failures never expose source
/// detail beyond the generic message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: INTERNAL_MESSAGE.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    #[serde(rename = "traceId")]
    trace_id: Uuid,
    #[serde(rename = "errorMessage")]
    error_message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_message = format!("{} : {}", self.status, self.message);
        tracing::error!(%error_message, "request failed");

        let body = ErrorResponse {
            trace_id: Uuid::new_v4(),
            error_message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<CsvDecodeError> for ApiError {
    fn from(err: CsvDecodeError) -> Self {
        match err {
            // Zero records is a client problem and says so.
            CsvDecodeError::Empty => Self::bad_request(err.to_string()),
            // Malformed content aborts the request without leaking detail.
            CsvDecodeError::Header(_) | CsvDecodeError::Record(_) => {
                tracing::error!(error = %err, "csv decode failed");
                Self::internal()
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "store failure during upload");
        metrics::counter!("upload_store_errors_total").increment(1);
        Self::internal()
    }
}
