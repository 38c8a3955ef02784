mod account;
mod meter_reading;

pub use account::Account;
pub use meter_reading::{MeterReading, READ_VALUE_MAX, READ_VALUE_MIN};
