//! Rate values and the shapes returned to callers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Date format used for every date string in the service.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One resolved price point between two currencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub from_currency: String,
    pub to_currency: String,
    pub rate: f64,
    pub timestamp: DateTime<Utc>,
    pub date: String,
}

impl ExchangeRate {
    pub fn new(from: &str, to: &str, rate: f64, timestamp: DateTime<Utc>, date: String) -> Self {
        Self {
            from_currency: from.to_string(),
            to_currency: to.to_string(),
            rate,
            timestamp,
            date,
        }
    }

    /// Rate stamped with the current instant and today's date.
    pub fn now(from: &str, to: &str, rate: f64) -> Self {
        let timestamp = Utc::now();
        let date = timestamp.format(DATE_FORMAT).to_string();
        Self::new(from, to, rate, timestamp, date)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub from: String,
    pub to: String,
    /// Zero means "one unit".
    #[serde(default)]
    pub amount: f64,
    /// `None` resolves the latest rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl ConversionRequest {
    pub fn latest(from: &str, to: &str, amount: f64) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            amount,
            date: None,
        }
    }

    pub fn on(from: &str, to: &str, amount: f64, date: &str) -> Self {
        Self {
            date: Some(date.to_string()),
            ..Self::latest(from, to, amount)
        }
    }
}

/// Converted amount together with the rate that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub amount: f64,
    #[serde(flatten)]
    pub quote: ExchangeRate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestRatesSnapshot {
    pub base_currency: String,
    pub rates: HashMap<String, f64>,
    pub timestamp: DateTime<Utc>,
    pub date: String,
}

impl LatestRatesSnapshot {
    /// Wraps a rate mapping with the current instant.
    pub fn now(base: &str, rates: HashMap<String, f64>) -> Self {
        let timestamp = Utc::now();
        Self {
            base_currency: base.to_string(),
            rates,
            date: timestamp.format(DATE_FORMAT).to_string(),
            timestamp,
        }
    }
}

/// Rates for one pair over a date range. Days that failed to resolve are absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalRatesSeries {
    pub from_currency: String,
    pub to_currency: String,
    pub rates: BTreeMap<String, ExchangeRate>,
    pub start_date: String,
    pub end_date: String,
}
