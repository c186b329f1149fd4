//! Core business logic abstractions

pub mod cache;
pub mod config;
pub mod currency;
pub mod error;
pub mod log;
pub mod rate;
pub mod validate;

// Re-export main types for cleaner imports
pub use currency::{RateProvider, SUPPORTED_CURRENCIES, is_supported_currency};
pub use error::{ServiceError, ServiceResult};
pub use rate::{
    ConversionRequest, ConversionResult, ExchangeRate, HistoricalRatesSeries, LatestRatesSnapshot,
};
