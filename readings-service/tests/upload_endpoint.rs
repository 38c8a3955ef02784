//! In-process scenario tests for the upload endpoint.
//!
//! These tests build the Axum router directly over in-memory stores and
//! drive it via `tower::ServiceExt::oneshot` — no TCP, no database.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use meter_client::domain::{Account, MeterReading};
use readings_service::http::{build_router, AppState};
use readings_service::store::{InMemoryAccountStore, InMemoryReadingStore};
use time::macros::datetime;
use tower::ServiceExt; // oneshot

const UPLOADS_URI: &str = "/api/v1/meter-readings/uploads";
const BOUNDARY: &str = "readings-test-boundary";

fn account(account_id: i32, first_name: &str) -> Account {
    Account {
        account_id,
        first_name: first_name.to_string(),
        last_name: "Test".to_string(),
        created: None,
        updated: None,
    }
}

/// Router over fresh in-memory stores; handles returned for assertions.
fn make_router(
    accounts: Vec<Account>,
    stored: Vec<MeterReading>,
) -> (axum::Router, InMemoryAccountStore, InMemoryReadingStore) {
    let account_store = InMemoryAccountStore::with_accounts(accounts);
    let reading_store = InMemoryReadingStore::with_readings(stored);
    let state = AppState::new(account_store.clone(), reading_store.clone());
    (build_router(Arc::new(state)), account_store, reading_store)
}

/// A multipart/form-data POST with the CSV under the `file` field.
fn csv_upload_request(csv: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"readings.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         {csv}\r\n\
         --{BOUNDARY}--\r\n"
    );

    Request::builder()
        .method("POST")
        .uri(UPLOADS_URI)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn call(router: axum::Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let bytes = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    let json = serde_json::from_slice(&bytes).expect("body is not valid JSON");
    (status, json)
}

#[tokio::test]
async fn five_valid_rows_all_persist_in_one_write() {
    let (router, _, reading_store) = make_router(
        vec![
            account(2344, "Tommy"),
            account(2233, "Barry"),
            account(8766, "Sally"),
            account(2345, "Jerry"),
            account(2346, "Ollie"),
        ],
        vec![],
    );

    let csv = "AccountId,MeterReadingDateTime,MeterReadValue\n\
               2344,22/04/2019 09:24,1002\n\
               2233,22/04/2019 12:25,323\n\
               8766,22/04/2019 12:25,3440\n\
               2345,22/04/2019 12:25,1002\n\
               2346,22/04/2019 12:25,9999\n";

    let (status, json) = call(router, csv_upload_request(csv)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], 5);
    assert_eq!(json["failed"], 0);

    assert_eq!(reading_store.add_range_count(), 1);
    assert_eq!(reading_store.save_count(), 1);
    assert_eq!(reading_store.committed().len(), 5);
}

#[tokio::test]
async fn duplicates_and_unknown_accounts_count_as_failed() {
    let (router, _, reading_store) = make_router(vec![account(2344, "Tommy")], vec![]);

    // One duplicated row, one unknown account, two distinct valid rows.
    let csv = "AccountId,MeterReadingDateTime,MeterReadValue\n\
               2344,22/04/2019 09:24,1002\n\
               2344,22/04/2019 09:24,1002\n\
               9999,22/04/2019 09:24,55\n\
               2344,22/04/2019 12:25,1010\n";

    let (status, json) = call(router, csv_upload_request(csv)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], 2);
    assert_eq!(json["failed"], 2);
    assert_eq!(reading_store.committed().len(), 2);
}

#[tokio::test]
async fn rows_older_than_stored_readings_are_rejected() {
    let (router, _, reading_store) = make_router(
        vec![account(2344, "Tommy")],
        vec![MeterReading::candidate(
            2344,
            datetime!(2019-04-22 12:00 UTC),
            900,
        )],
    );

    let csv = "AccountId,MeterReadingDateTime,MeterReadValue\n\
               2344,22/04/2019 09:24,1002\n";

    let (status, json) = call(router, csv_upload_request(csv)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], 0);
    assert_eq!(json["failed"], 1);
    assert_eq!(reading_store.save_count(), 0);
    assert_eq!(reading_store.committed().len(), 1);
}

#[tokio::test]
async fn non_multipart_request_returns_400_with_trace_id() {
    let (router, _, _) = make_router(vec![], vec![]);

    let req = Request::builder()
        .method("POST")
        .uri(UPLOADS_URI)
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();

    let (status, json) = call(router, req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = json["errorMessage"].as_str().unwrap();
    assert!(message.contains("Csv file was not provided!"), "{message}");

    let trace_id = json["traceId"].as_str().unwrap();
    uuid::Uuid::parse_str(trace_id).expect("traceId is not a uuid");
}

#[tokio::test]
async fn multipart_without_file_field_returns_400() {
    let (router, _, _) = make_router(vec![], vec![]);

    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"notes\"\r\n\r\n\
         hello\r\n\
         --{BOUNDARY}--\r\n"
    );
    let req = Request::builder()
        .method("POST")
        .uri(UPLOADS_URI)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, json) = call(router, req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["errorMessage"]
        .as_str()
        .unwrap()
        .contains("Csv file was not provided!"));
}

#[tokio::test]
async fn empty_csv_returns_400() {
    let (router, _, reading_store) = make_router(vec![account(2344, "Tommy")], vec![]);

    let csv = "AccountId,MeterReadingDateTime,MeterReadValue\n";
    let (status, json) = call(router, csv_upload_request(csv)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["errorMessage"]
        .as_str()
        .unwrap()
        .contains("CSV file contains no records."));
    assert_eq!(reading_store.save_count(), 0);
}

#[tokio::test]
async fn malformed_row_returns_500_with_generic_message() {
    let (router, _, _) = make_router(vec![account(2344, "Tommy")], vec![]);

    let csv = "AccountId,MeterReadingDateTime,MeterReadValue\n\
               2344,not-a-date,1002\n";

    let (status, json) = call(router, csv_upload_request(csv)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = json["errorMessage"].as_str().unwrap();
    assert!(message.contains("An internal server error occurred."), "{message}");
    assert!(!message.contains("not-a-date"), "internal detail leaked: {message}");
}

#[tokio::test]
async fn health_returns_200() {
    let (router, _, _) = make_router(vec![], vec![]);

    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let (status, json) = call(router, req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}
