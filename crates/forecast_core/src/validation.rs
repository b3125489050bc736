//! Field-level validation of incoming prediction requests.
//!
//! Checks run in a fixed order and the first failure wins, so the message a
//! caller sees depends only on the request itself.

use chrono::NaiveDate;
use salescast_types::PredictionRequest;
use std::ops::RangeInclusive;
use thiserror::Error;

pub const STORE_RANGE: RangeInclusive<i64> = 1..=1115;
pub const DAY_OF_WEEK_RANGE: RangeInclusive<i64> = 1..=7;
pub const FLAG_VALUES: [i64; 2] = [0, 1];
pub const STATE_HOLIDAY_VALUES: [&str; 4] = ["0", "a", "b", "c"];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Why a request was rejected. `Display` is the message returned to callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid Date! Print date in format YYYY-MM-DD")]
    InvalidDate,

    #[error("{field} must be >={min} and <={max}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
    },

    #[error("{field} must be in list {allowed}")]
    NotInList {
        field: &'static str,
        allowed: &'static str,
    },
}

impl ValidationError {
    /// Name of the offending request field
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::InvalidDate => "Date",
            ValidationError::OutOfRange { field, .. } => *field,
            ValidationError::NotInList { field, .. } => *field,
        }
    }
}

/// Validate a single request.
pub fn validate(request: &PredictionRequest) -> Result<(), ValidationError> {
    parse_date(&request.date).ok_or(ValidationError::InvalidDate)?;

    check_range(request.store, STORE_RANGE, "Store")?;
    check_range(request.day_of_week, DAY_OF_WEEK_RANGE, "DayOfWeek")?;

    check_flag(request.open, "Open")?;
    check_flag(request.promo, "Promo")?;
    check_flag(request.school_holiday, "SchoolHoliday")?;

    if !STATE_HOLIDAY_VALUES.contains(&request.state_holiday.as_str()) {
        return Err(ValidationError::NotInList {
            field: "StateHoliday",
            allowed: "['0', 'a', 'b', 'c']",
        });
    }

    Ok(())
}

/// Strict `YYYY-MM-DD` parse: exactly ten characters, zero padded, and a
/// date that exists on the calendar.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let bytes = raw.as_bytes();
    if bytes.len() != 10 {
        return None;
    }
    let well_formed = bytes.iter().enumerate().all(|(i, b)| match i {
        4 | 7 => *b == b'-',
        _ => b.is_ascii_digit(),
    });
    if !well_formed {
        return None;
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}

fn check_range(
    value: i64,
    range: RangeInclusive<i64>,
    field: &'static str,
) -> Result<(), ValidationError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

fn check_flag(value: i64, field: &'static str) -> Result<(), ValidationError> {
    if FLAG_VALUES.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::NotInList {
            field,
            allowed: "[0, 1]",
        })
    }
}
