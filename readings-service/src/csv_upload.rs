//! CSV decoding for uploaded meter readings.
//!
//! Expected header columns (by name, order-insensitive):
//! - `AccountId`
//! - `MeterReadingDateTime` (`dd/MM/yyyy HH:mm`, assumed UTC)
//! - `MeterReadValue`

use csv::StringRecord;
use meter_client::domain::MeterReading;
use time::{macros::format_description, PrimitiveDateTime};

pub const ACCOUNT_ID_COLUMN: &str = "AccountId";
pub const DATE_TIME_COLUMN: &str = "MeterReadingDateTime";
pub const READ_VALUE_COLUMN: &str = "MeterReadValue";

#[derive(thiserror::Error, Debug)]
pub enum CsvDecodeError {
    /// The file parsed but produced zero records. Client input error.
    #[error("CSV file contains no records.")]
    Empty,
    #[error("failed to read CSV headers: {0}")]
    Header(String),
    #[error("invalid CSV record: {0}")]
    Record(String),
}

pub fn decode_readings(bytes: &[u8]) -> Result<Vec<MeterReading>, CsvDecodeError> {
    let mut rdr = csv::Reader::from_reader(bytes);
    let headers = rdr
        .headers()
        .map_err(|e| CsvDecodeError::Header(e.to_string()))?
        .clone();

    let mut readings = Vec::new();
    for result in rdr.records() {
        let record =
            result.map_err(|e| CsvDecodeError::Record(format!("failed to read CSV record: {e}")))?;
        readings.push(record_to_reading(&record, &headers)?);
    }

    if readings.is_empty() {
        return Err(CsvDecodeError::Empty);
    }

    metrics::counter!("csv_readings_decoded_total").increment(readings.len() as u64);
    Ok(readings)
}

fn record_to_reading(
    record: &StringRecord,
    headers: &StringRecord,
) -> Result<MeterReading, CsvDecodeError> {
    let get = |name: &str| -> Result<&str, CsvDecodeError> {
        headers
            .iter()
            .position(|h| h == name)
            .and_then(|idx| record.get(idx))
            .ok_or_else(|| CsvDecodeError::Record(format!("missing column '{name}' in CSV record")))
    };

    let account_str = get(ACCOUNT_ID_COLUMN)?;
    let account_id: i32 = account_str
        .trim()
        .parse()
        .map_err(|e| CsvDecodeError::Record(format!("invalid AccountId '{account_str}': {e}")))?;

    let format = format_description!("[day]/[month]/[year] [hour]:[minute]");
    let ts_str = get(DATE_TIME_COLUMN)?;
    let reading_date_time = PrimitiveDateTime::parse(ts_str.trim(), format)
        .map_err(|e| {
            CsvDecodeError::Record(format!("invalid MeterReadingDateTime '{ts_str}': {e}"))
        })?
        .assume_utc();

    let value_str = get(READ_VALUE_COLUMN)?;
    let read_value: i32 = value_str.trim().parse().map_err(|e| {
        CsvDecodeError::Record(format!("invalid MeterReadValue '{value_str}': {e}"))
    })?;

    Ok(MeterReading::candidate(account_id, reading_date_time, read_value))
}
