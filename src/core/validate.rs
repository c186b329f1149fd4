//! Input checks for currency codes and dates

use crate::core::rate::DATE_FORMAT;
use chrono::{Days, NaiveDate, Utc};
use thiserror::Error;

/// How far back a historical date may reach.
pub const MAX_HISTORY_DAYS: u64 = 90;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("date cannot be empty")]
    Empty,

    #[error("invalid date format '{0}', expected YYYY-MM-DD")]
    InvalidFormat(String),

    #[error("date cannot be in the future")]
    InFuture,

    #[error("date cannot be more than {max_days} days in the past")]
    TooOld { max_days: u64 },

    #[error("start date {start} cannot be after end date {end}")]
    InvertedRange { start: String, end: String },
}

pub fn parse_date(date_str: &str) -> Result<NaiveDate, DateError> {
    NaiveDate::parse_from_str(date_str, DATE_FORMAT)
        .map_err(|_| DateError::InvalidFormat(date_str.to_string()))
}

/// Checks `date_str` against the default history window, relative to today (UTC).
pub fn validate_date(date_str: &str) -> Result<(), DateError> {
    validate_date_within(date_str, MAX_HISTORY_DAYS)
}

pub fn validate_date_within(date_str: &str, max_days: u64) -> Result<(), DateError> {
    validate_date_at(date_str, Utc::now().date_naive(), max_days)
}

fn validate_date_at(date_str: &str, today: NaiveDate, max_days: u64) -> Result<(), DateError> {
    if date_str.is_empty() {
        return Err(DateError::Empty);
    }

    let date = parse_date(date_str)?;
    if date > today {
        return Err(DateError::InFuture);
    }

    let earliest = today
        .checked_sub_days(Days::new(max_days))
        .unwrap_or(NaiveDate::MIN);
    if date < earliest {
        return Err(DateError::TooOld { max_days });
    }

    Ok(())
}

/// Every calendar day from `start` to `end`, both inclusive, ascending.
pub fn expand_date_range(start: &str, end: &str) -> Result<Vec<String>, DateError> {
    let start_date = parse_date(start)?;
    let end_date = parse_date(end)?;

    if start_date > end_date {
        return Err(DateError::InvertedRange {
            start: start.to_string(),
            end: end.to_string(),
        });
    }

    Ok(start_date
        .iter_days()
        .take_while(|day| *day <= end_date)
        .map(|day| day.format(DATE_FORMAT).to_string())
        .collect())
}
