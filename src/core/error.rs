//! Errors reported to callers of the rate service.

use crate::core::validate::DateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("invalid {field}: {source}")]
    InvalidDate {
        field: &'static str,
        #[source]
        source: DateError,
    },

    #[error("start date {start} cannot be after end date {end}")]
    InvertedDateRange { start: String, end: String },

    #[error("invalid amount: {0}")]
    InvalidAmount(f64),

    /// Only reachable with providers that do not absorb their own failures.
    #[error("rate unavailable: {0}")]
    RateUnavailable(#[source] anyhow::Error),
}

impl ServiceError {
    pub(crate) fn invalid_date(field: &'static str, source: DateError) -> Self {
        match source {
            DateError::InvertedRange { start, end } => Self::InvertedDateRange { start, end },
            source => Self::InvalidDate { field, source },
        }
    }

    /// True for errors caused by the caller's input.
    pub fn is_input_error(&self) -> bool {
        !matches!(self, Self::RateUnavailable(_))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
