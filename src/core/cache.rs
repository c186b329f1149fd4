//! Cache abstractions shared by the resolver and the refresher

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("key expired: {0}")]
    Expired(String),

    #[error("failed to encode or decode cached value for {key}: {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    /// Missing and expired entries are both plain misses.
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Expired(_))
    }
}

/// Key for the rate mapping of a base currency, e.g. `latest_rates_USD`.
pub fn latest_rates_key(base: &str) -> String {
    format!("latest_rates_{base}")
}

/// Key for the latest single rate of a pair, e.g. `rate_USD_INR_latest`.
pub fn latest_rate_key(from: &str, to: &str) -> String {
    format!("rate_{from}_{to}_latest")
}

/// Key for a single rate on a given day, e.g. `rate_USD_INR_2025-08-01`.
pub fn historical_rate_key(from: &str, to: &str, date: &str) -> String {
    format!("rate_{from}_{to}_{date}")
}
