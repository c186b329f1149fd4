//! Currency conversion abstractions

use crate::core::rate::ExchangeRate;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// The closed set of currency codes accepted anywhere in the service.
pub const SUPPORTED_CURRENCIES: [&str; 5] = ["USD", "INR", "EUR", "JPY", "GBP"];

/// Case-sensitive membership test against [`SUPPORTED_CURRENCIES`].
pub fn is_supported_currency(code: &str) -> bool {
    SUPPORTED_CURRENCIES.contains(&code)
}

/// Supported codes other than `base`, in declaration order.
pub fn quote_currencies(base: &str) -> Vec<&'static str> {
    SUPPORTED_CURRENCIES
        .iter()
        .copied()
        .filter(|code| *code != base)
        .collect()
}

/// Source of exchange rates.
///
/// Implementations backed by a network service are expected to absorb
/// their own failures; an `Err` is surfaced to callers as an unavailable
/// rate.
#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn get_latest_rate(&self, from: &str, to: &str) -> Result<ExchangeRate>;

    async fn get_historical_rate(&self, from: &str, to: &str, date: &str) -> Result<ExchangeRate>;

    /// Rates from `base` to every other supported currency, keyed by quote code.
    async fn get_all_latest_rates(&self, base: &str) -> Result<HashMap<String, f64>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_currencies() {
        for code in ["USD", "INR", "EUR", "JPY", "GBP"] {
            assert!(is_supported_currency(code), "{code} should be supported");
        }
        for code in ["CAD", "AUD", "XYZ", "usd", "", " USD"] {
            assert!(!is_supported_currency(code), "{code} should be rejected");
        }
    }

    #[test]
    fn test_quote_currencies_excludes_base() {
        let quotes = quote_currencies("EUR");
        assert_eq!(quotes, vec!["USD", "INR", "JPY", "GBP"]);
        assert_eq!(quote_currencies("XYZ").len(), 5);
    }
}
