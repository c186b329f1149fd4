//! Offline rate table used whenever the upstream provider is unusable.

use crate::core::rate::ExchangeRate;
use chrono::Utc;
use std::collections::HashMap;

/// Multiplier for pairs missing from the table.
pub const DEFAULT_RATE: f64 = 1.0;

const FALLBACK_RATES: [(&str, [(&str, f64); 4]); 5] = [
    (
        "USD",
        [("INR", 83.25), ("EUR", 0.85), ("JPY", 110.50), ("GBP", 0.73)],
    ),
    (
        "EUR",
        [("USD", 1.18), ("INR", 98.12), ("JPY", 130.25), ("GBP", 0.86)],
    ),
    (
        "GBP",
        [("USD", 1.37), ("INR", 114.05), ("EUR", 1.16), ("JPY", 151.38)],
    ),
    (
        "INR",
        [("USD", 0.012), ("EUR", 0.010), ("JPY", 1.33), ("GBP", 0.0088)],
    ),
    (
        "JPY",
        [("USD", 0.0090), ("EUR", 0.0077), ("INR", 0.75), ("GBP", 0.0066)],
    ),
];

/// Every tabulated rate from `base`; empty for an unknown base.
pub fn fallback_rates(base: &str) -> HashMap<String, f64> {
    FALLBACK_RATES
        .iter()
        .find(|(code, _)| *code == base)
        .map(|(_, quotes)| {
            quotes
                .iter()
                .map(|(code, rate)| (code.to_string(), *rate))
                .collect()
        })
        .unwrap_or_default()
}

pub fn fallback_rate(from: &str, to: &str) -> f64 {
    FALLBACK_RATES
        .iter()
        .find(|(code, _)| *code == from)
        .and_then(|(_, quotes)| quotes.iter().find(|(code, _)| *code == to))
        .map_or(DEFAULT_RATE, |(_, rate)| *rate)
}

/// Offline latest rate, stamped now.
pub fn latest_rate(from: &str, to: &str) -> ExchangeRate {
    ExchangeRate::now(from, to, fallback_rate(from, to))
}

/// Offline rate for `date`; the date is kept, the timestamp is now.
pub fn historical_rate(from: &str, to: &str, date: &str) -> ExchangeRate {
    ExchangeRate::new(
        from,
        to,
        fallback_rate(from, to),
        Utc::now(),
        date.to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::{SUPPORTED_CURRENCIES, quote_currencies};

    #[test]
    fn test_table_covers_every_pair() {
        for base in SUPPORTED_CURRENCIES {
            let rates = fallback_rates(base);
            let mut codes: Vec<_> = rates.keys().cloned().collect();
            codes.sort();
            let mut expected: Vec<_> = quote_currencies(base)
                .into_iter()
                .map(String::from)
                .collect();
            expected.sort();
            assert_eq!(codes, expected, "quotes for {base}");
            assert!(rates.values().all(|r| r.is_finite() && *r > 0.0));
        }
    }

    #[test]
    fn test_fallback_rate_lookup() {
        assert_eq!(fallback_rate("USD", "INR"), 83.25);
        assert_eq!(fallback_rate("GBP", "JPY"), 151.38);
        assert_eq!(fallback_rate("USD", "USD"), DEFAULT_RATE);
        assert_eq!(fallback_rate("XYZ", "USD"), DEFAULT_RATE);
        assert!(fallback_rates("XYZ").is_empty());
    }

    #[test]
    fn test_historical_rate_keeps_date() {
        let rate = historical_rate("EUR", "GBP", "2025-08-01");
        assert_eq!(rate.date, "2025-08-01");
        assert_eq!(rate.rate, 0.86);
        assert_eq!(rate.from_currency, "EUR");
        assert_eq!(rate.to_currency, "GBP");
    }
}
