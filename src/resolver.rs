//! Resolves conversions and rate lookups through the cache and the provider.

use crate::core::cache::{historical_rate_key, latest_rate_key, latest_rates_key};
use crate::core::config::AppConfig;
use crate::core::currency::{RateProvider, is_supported_currency};
use crate::core::error::{ServiceError, ServiceResult};
use crate::core::rate::{
    ConversionRequest, ConversionResult, ExchangeRate, HistoricalRatesSeries, LatestRatesSnapshot,
};
use crate::core::validate::{MAX_HISTORY_DAYS, expand_date_range, validate_date_within};
use crate::store::MemoryCache;
use futures::future::join_all;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Lifetime of latest rates and rate mappings.
    pub latest_ttl: Duration,
    /// Lifetime of rates for a past date.
    pub historical_ttl: Duration,
    pub max_history_days: u64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            latest_ttl: Duration::from_secs(60 * 60),
            historical_ttl: Duration::from_secs(24 * 60 * 60),
            max_history_days: MAX_HISTORY_DAYS,
        }
    }
}

impl From<&AppConfig> for ResolverSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            latest_ttl: config.latest_ttl(),
            historical_ttl: config.historical_ttl(),
            max_history_days: config.max_history_days,
        }
    }
}

pub struct RateResolver {
    provider: Arc<dyn RateProvider>,
    cache: Arc<MemoryCache>,
    settings: ResolverSettings,
}

impl RateResolver {
    pub fn new(
        provider: Arc<dyn RateProvider>,
        cache: Arc<MemoryCache>,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            provider,
            cache,
            settings,
        }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Converts `request.amount` at the latest rate, or at the rate of `request.date`.
    pub async fn convert(&self, request: &ConversionRequest) -> ServiceResult<ConversionResult> {
        ensure_supported(&request.from)?;
        ensure_supported(&request.to)?;
        if !request.amount.is_finite() {
            return Err(ServiceError::InvalidAmount(request.amount));
        }

        let amount = if request.amount == 0.0 {
            1.0
        } else {
            request.amount
        };

        let quote = match request.date.as_deref().filter(|date| !date.is_empty()) {
            Some(date) => {
                self.validate_date("date", date)?;
                self.historical_rate(&request.from, &request.to, date)
                    .await?
            }
            None => self.latest_rate(&request.from, &request.to).await?,
        };

        Ok(ConversionResult {
            amount: amount * quote.rate,
            quote,
        })
    }

    /// Rates from `base` to every other supported currency.
    ///
    /// Only the mapping is cached; the snapshot is always stamped now.
    pub async fn latest_rates(&self, base: &str) -> ServiceResult<LatestRatesSnapshot> {
        ensure_supported(base)?;

        let rates: HashMap<String, f64> = self
            .cached_or_fetch(
                &latest_rates_key(base),
                self.settings.latest_ttl,
                self.provider.get_all_latest_rates(base),
            )
            .await?;

        Ok(LatestRatesSnapshot::now(base, rates))
    }

    /// Daily rates for `from`/`to` over `[start, end]`.
    ///
    /// A day that cannot be resolved is logged and left out of the series.
    pub async fn historical_rates(
        &self,
        from: &str,
        to: &str,
        start: &str,
        end: &str,
    ) -> ServiceResult<HistoricalRatesSeries> {
        ensure_supported(from)?;
        ensure_supported(to)?;
        self.validate_date("start date", start)?;
        self.validate_date("end date", end)?;

        let dates = expand_date_range(start, end)
            .map_err(|e| ServiceError::invalid_date("date range", e))?;

        let lookups = dates.iter().map(|date| async move {
            (date, self.historical_rate(from, to, date).await)
        });

        let mut rates = BTreeMap::new();
        for (date, result) in join_all(lookups).await {
            match result {
                Ok(rate) => {
                    rates.insert(date.clone(), rate);
                }
                Err(e) => warn!(date = %date, "Skipping historical rate: {}", e),
            }
        }

        Ok(HistoricalRatesSeries {
            from_currency: from.to_string(),
            to_currency: to.to_string(),
            rates,
            start_date: start.to_string(),
            end_date: end.to_string(),
        })
    }

    async fn latest_rate(&self, from: &str, to: &str) -> ServiceResult<ExchangeRate> {
        self.cached_or_fetch(
            &latest_rate_key(from, to),
            self.settings.latest_ttl,
            self.provider.get_latest_rate(from, to),
        )
        .await
    }

    async fn historical_rate(&self, from: &str, to: &str, date: &str) -> ServiceResult<ExchangeRate> {
        self.cached_or_fetch(
            &historical_rate_key(from, to, date),
            self.settings.historical_ttl,
            self.provider.get_historical_rate(from, to, date),
        )
        .await
    }

    /// Serves `key` from the cache, or awaits `fetch` and caches its result.
    async fn cached_or_fetch<T, Fut>(&self, key: &str, ttl: Duration, fetch: Fut) -> ServiceResult<T>
    where
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        match self.cache.get::<T>(key).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_miss() => debug!("Resolving {} from provider", key),
            Err(e) => warn!("Ignoring unreadable cache entry: {}", e),
        }

        let value = fetch.await.map_err(ServiceError::RateUnavailable)?;
        if let Err(e) = self.cache.set(key, &value, ttl).await {
            warn!("Failed to cache {}: {}", key, e);
        }
        Ok(value)
    }

    fn validate_date(&self, field: &'static str, date: &str) -> ServiceResult<()> {
        validate_date_within(date, self.settings.max_history_days)
            .map_err(|e| ServiceError::invalid_date(field, e))
    }
}

fn ensure_supported(code: &str) -> ServiceResult<()> {
    if is_supported_currency(code) {
        Ok(())
    } else {
        Err(ServiceError::UnsupportedCurrency(code.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rate::DATE_FORMAT;
    use crate::core::validate::DateError;
    use crate::providers::fallback;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use chrono::{Days, Utc};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockRateProvider {
        latest_calls: AtomicUsize,
        historical_calls: AtomicUsize,
        all_latest_calls: AtomicUsize,
        failing_dates: Mutex<Vec<String>>,
        fail_latest: bool,
    }

    impl MockRateProvider {
        fn failing_on(dates: &[&str]) -> Self {
            let provider = Self::default();
            *provider.failing_dates.lock().unwrap() =
                dates.iter().map(|d| d.to_string()).collect();
            provider
        }
    }

    #[async_trait]
    impl RateProvider for MockRateProvider {
        async fn get_latest_rate(&self, from: &str, to: &str) -> Result<ExchangeRate> {
            self.latest_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_latest {
                return Err(anyhow!("upstream down"));
            }
            Ok(fallback::latest_rate(from, to))
        }

        async fn get_historical_rate(&self, from: &str, to: &str, date: &str) -> Result<ExchangeRate> {
            self.historical_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing_dates.lock().unwrap().iter().any(|d| d == date) {
                return Err(anyhow!("no data for {date}"));
            }
            Ok(fallback::historical_rate(from, to, date))
        }

        async fn get_all_latest_rates(&self, base: &str) -> Result<HashMap<String, f64>> {
            self.all_latest_calls.fetch_add(1, Ordering::SeqCst);
            Ok(fallback::fallback_rates(base))
        }
    }

    fn resolver_with(provider: Arc<MockRateProvider>) -> (RateResolver, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new());
        let resolver = RateResolver::new(provider, Arc::clone(&cache), ResolverSettings::default());
        (resolver, cache)
    }

    fn days_ago(n: u64) -> String {
        Utc::now()
            .date_naive()
            .checked_sub_days(Days::new(n))
            .unwrap()
            .format(DATE_FORMAT)
            .to_string()
    }

    #[tokio::test]
    async fn test_convert_latest() {
        let provider = Arc::new(MockRateProvider::default());
        let (resolver, cache) = resolver_with(Arc::clone(&provider));

        let result = resolver
            .convert(&ConversionRequest::latest("USD", "INR", 100.0))
            .await
            .unwrap();

        assert_eq!(result.amount, 8325.0);
        assert_eq!(result.quote.rate, 83.25);
        assert_eq!(result.quote.from_currency, "USD");
        assert_eq!(result.quote.to_currency, "INR");
        assert!(cache.contains_key("rate_USD_INR_latest").await);

        let again = resolver
            .convert(&ConversionRequest::latest("USD", "INR", 2.0))
            .await
            .unwrap();
        assert_eq!(again.amount, 166.5);
        assert_eq!(again.quote, result.quote);
        assert_eq!(provider.latest_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_convert_zero_amount_defaults_to_one() {
        let (resolver, _) = resolver_with(Arc::new(MockRateProvider::default()));

        let result = resolver
            .convert(&ConversionRequest::latest("EUR", "GBP", 0.0))
            .await
            .unwrap();
        assert_eq!(result.amount, 0.86);
    }

    #[tokio::test]
    async fn test_convert_rejects_non_finite_amount() {
        let provider = Arc::new(MockRateProvider::default());
        let (resolver, cache) = resolver_with(Arc::clone(&provider));

        for amount in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = resolver
                .convert(&ConversionRequest::latest("USD", "INR", amount))
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::InvalidAmount(_)));
            assert!(err.is_input_error());
        }

        assert_eq!(provider.latest_calls.load(Ordering::SeqCst), 0);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_convert_historical() {
        let provider = Arc::new(MockRateProvider::default());
        let (resolver, cache) = resolver_with(Arc::clone(&provider));
        let date = days_ago(10);

        let result = resolver
            .convert(&ConversionRequest::on("GBP", "EUR", 10.0, &date))
            .await
            .unwrap();

        assert!((result.amount - 11.6).abs() < 1e-9);
        assert_eq!(result.quote.date, date);
        assert!(cache.contains_key(&format!("rate_GBP_EUR_{date}")).await);
        assert_eq!(provider.historical_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.latest_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_convert_empty_date_means_latest() {
        let provider = Arc::new(MockRateProvider::default());
        let (resolver, _) = resolver_with(Arc::clone(&provider));

        resolver
            .convert(&ConversionRequest::on("USD", "JPY", 1.0, ""))
            .await
            .unwrap();
        assert_eq!(provider.latest_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_convert_unsupported_currency_touches_nothing() {
        let provider = Arc::new(MockRateProvider::default());
        let (resolver, cache) = resolver_with(Arc::clone(&provider));

        let err = resolver
            .convert(&ConversionRequest::latest("XYZ", "USD", 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UnsupportedCurrency(ref c) if c == "XYZ"));

        let err = resolver
            .convert(&ConversionRequest::latest("USD", "usd", 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UnsupportedCurrency(_)));

        assert_eq!(provider.latest_calls.load(Ordering::SeqCst), 0);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_convert_invalid_date() {
        let provider = Arc::new(MockRateProvider::default());
        let (resolver, cache) = resolver_with(Arc::clone(&provider));

        let err = resolver
            .convert(&ConversionRequest::on("USD", "INR", 1.0, "01-08-2025"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidDate {
                field: "date",
                source: DateError::InvalidFormat(_)
            }
        ));

        let err = resolver
            .convert(&ConversionRequest::on("USD", "INR", 1.0, &days_ago(91)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidDate {
                source: DateError::TooOld { .. },
                ..
            }
        ));

        assert_eq!(provider.historical_calls.load(Ordering::SeqCst), 0);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_convert_provider_failure_is_unavailable() {
        let provider = Arc::new(MockRateProvider {
            fail_latest: true,
            ..Default::default()
        });
        let (resolver, cache) = resolver_with(provider);

        let err = resolver
            .convert(&ConversionRequest::latest("USD", "EUR", 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::RateUnavailable(_)));
        assert!(!err.is_input_error());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_latest_rates_cached_once() {
        let provider = Arc::new(MockRateProvider::default());
        let (resolver, cache) = resolver_with(Arc::clone(&provider));

        let first = resolver.latest_rates("USD").await.unwrap();
        for _ in 0..5 {
            let snapshot = resolver.latest_rates("USD").await.unwrap();
            assert_eq!(snapshot.rates, first.rates);
            assert!(snapshot.timestamp >= first.timestamp);
        }

        assert_eq!(first.base_currency, "USD");
        assert_eq!(first.rates.len(), 4);
        assert!(!first.rates.contains_key("USD"));
        assert_eq!(first.date, Utc::now().format(DATE_FORMAT).to_string());
        assert_eq!(provider.all_latest_calls.load(Ordering::SeqCst), 1);
        assert!(cache.contains_key("latest_rates_USD").await);
    }

    #[tokio::test]
    async fn test_latest_rates_refetched_after_ttl() {
        let provider = Arc::new(MockRateProvider::default());
        let cache = Arc::new(MemoryCache::new());
        let resolver = RateResolver::new(
            provider.clone(),
            cache,
            ResolverSettings {
                latest_ttl: Duration::from_millis(10),
                ..Default::default()
            },
        );

        resolver.latest_rates("EUR").await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        resolver.latest_rates("EUR").await.unwrap();

        assert_eq!(provider.all_latest_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_latest_rates_unsupported_base() {
        let provider = Arc::new(MockRateProvider::default());
        let (resolver, _) = resolver_with(Arc::clone(&provider));

        let err = resolver.latest_rates("CAD").await.unwrap_err();
        assert!(matches!(err, ServiceError::UnsupportedCurrency(_)));
        assert_eq!(provider.all_latest_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_historical_rates_series() {
        let provider = Arc::new(MockRateProvider::default());
        let (resolver, _) = resolver_with(Arc::clone(&provider));
        let (start, end) = (days_ago(5), days_ago(3));

        let series = resolver
            .historical_rates("USD", "EUR", &start, &end)
            .await
            .unwrap();

        let dates: Vec<_> = series.rates.keys().cloned().collect();
        assert_eq!(dates, vec![days_ago(5), days_ago(4), days_ago(3)]);
        assert!(series.rates.values().all(|r| r.rate == 0.85));
        assert_eq!(series.start_date, start);
        assert_eq!(series.end_date, end);

        resolver
            .historical_rates("USD", "EUR", &start, &end)
            .await
            .unwrap();
        assert_eq!(provider.historical_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_historical_rates_skip_failed_days() {
        let missing = days_ago(4);
        let provider = Arc::new(MockRateProvider::failing_on(&[missing.as_str()]));
        let (resolver, cache) = resolver_with(Arc::clone(&provider));

        let series = resolver
            .historical_rates("INR", "JPY", &days_ago(5), &days_ago(3))
            .await
            .unwrap();

        assert_eq!(series.rates.len(), 2);
        assert!(!series.rates.contains_key(&missing));
        assert!(!cache.contains_key(&format!("rate_INR_JPY_{missing}")).await);
    }

    #[tokio::test]
    async fn test_historical_rates_input_errors() {
        let provider = Arc::new(MockRateProvider::default());
        let (resolver, _) = resolver_with(Arc::clone(&provider));

        let err = resolver
            .historical_rates("USD", "EUR", &days_ago(1), &days_ago(3))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvertedDateRange { .. }));

        let err = resolver
            .historical_rates("USD", "EUR", "", &days_ago(3))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidDate {
                field: "start date",
                source: DateError::Empty
            }
        ));

        let err = resolver
            .historical_rates("USD", "AUD", &days_ago(3), &days_ago(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UnsupportedCurrency(_)));

        assert_eq!(provider.historical_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_every_pair_has_positive_rate() {
        let (resolver, _) = resolver_with(Arc::new(MockRateProvider::default()));

        for from in crate::core::currency::SUPPORTED_CURRENCIES {
            for to in crate::core::currency::SUPPORTED_CURRENCIES {
                let result = resolver
                    .convert(&ConversionRequest::latest(from, to, 1.0))
                    .await
                    .unwrap();
                assert!(result.quote.rate.is_finite() && result.quote.rate > 0.0);
            }
        }
    }
}
