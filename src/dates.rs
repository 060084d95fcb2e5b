// Spreadsheet date serials → calendar dates
//
// Spreadsheets store dates as a day count from their own epoch. Day 25569 is
// 1970-01-01, so:
//   unix_seconds = (serial - 25569) * 86400

use chrono::{DateTime, NaiveDate};
use serde_json::Value;

/// Days between the spreadsheet epoch and the Unix epoch
pub const SPREADSHEET_EPOCH_OFFSET_DAYS: f64 = 25569.0;

pub const SECONDS_PER_DAY: f64 = 86400.0;

/// Largest instant a spreadsheet date can name (±100,000,000 days in ms)
const MAX_ABS_MILLIS: f64 = 8.64e15;

/// Output format for normalized dates
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// DateNormalizer - lenient conversion of date serials
///
/// Numbers become `YYYY-MM-DD` strings. Anything else is returned as-is:
/// strings are assumed to already be dates, nulls are left for validation.
#[derive(Debug, Clone, Copy)]
pub struct DateNormalizer {
    epoch_offset_days: f64,
}

impl Default for DateNormalizer {
    fn default() -> Self {
        DateNormalizer {
            epoch_offset_days: SPREADSHEET_EPOCH_OFFSET_DAYS,
        }
    }
}

impl DateNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a serial to the UTC calendar day it falls on
    ///
    /// Returns `None` for NaN, infinities and serials outside the date range.
    pub fn serial_to_date(&self, serial: f64) -> Option<NaiveDate> {
        if !serial.is_finite() {
            return None;
        }

        let millis = (serial - self.epoch_offset_days) * SECONDS_PER_DAY * 1000.0;
        if millis.abs() > MAX_ABS_MILLIS {
            return None;
        }

        // Truncate sub-millisecond fractions toward zero
        DateTime::from_timestamp_millis(millis as i64).map(|dt| dt.date_naive())
    }

    /// Normalize one raw field value
    pub fn normalize(&self, value: Value) -> Value {
        match value {
            Value::Number(number) => match number.as_f64().and_then(|s| self.serial_to_date(s)) {
                Some(date) => Value::String(date.format(ISO_DATE_FORMAT).to_string()),
                None => Value::Number(number),
            },
            other => other,
        }
    }
}
