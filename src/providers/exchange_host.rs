use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Url;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::core::config::ProviderConfig;
use crate::core::currency::{RateProvider, quote_currencies};
use crate::core::rate::{DATE_FORMAT, ExchangeRate};
use crate::providers::fallback;
use crate::providers::util::with_retry;

/// Rate provider backed by an exchangerate.host compatible API.
///
/// Every failure degrades to the offline table in [`fallback`], so the
/// trait methods never return an error.
pub struct ExchangeHostProvider {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    retries: usize,
    retry_delay: Duration,
}

impl ExchangeHostProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("fxrates/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(ExchangeHostProvider {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
            client,
            retries: config.retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    async fn fetch_quotes(
        &self,
        endpoint: &str,
        source: &str,
        currencies: &[&str],
        date: Option<&str>,
    ) -> Result<QuotesResponse> {
        let currency_list = currencies.join(",");
        let mut params = Vec::with_capacity(4);
        if let Some(api_key) = &self.api_key {
            params.push(("access_key", api_key.as_str()));
        }
        if let Some(date) = date {
            params.push(("date", date));
        }
        params.push(("source", source));
        params.push(("currencies", currency_list.as_str()));

        let url = Url::parse_with_params(&format!("{}/{}", self.base_url, endpoint), &params)
            .with_context(|| format!("Invalid provider URL: {}/{}", self.base_url, endpoint))?;
        debug!("Requesting quotes from {}/{}", self.base_url, endpoint);

        let response = with_retry(
            || async { self.client.get(url.clone()).send().await },
            self.retries,
            self.retry_delay,
        )
        .await
        .with_context(|| format!("Request error for {endpoint} quotes from {source}"))?;

        if !response.status().is_success() {
            bail!("HTTP error: {} for {} quotes", response.status(), endpoint);
        }

        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read {endpoint} response body"))?;

        let data: QuotesResponse = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse JSON response for {endpoint} quotes"))?;

        if let Some(error) = &data.error {
            bail!("Provider error {}: {}", error.code, error.info);
        }
        if !data.success {
            bail!("Provider reported an unsuccessful {} response", endpoint);
        }
        Ok(data)
    }

    async fn live_rate(&self, from: &str, to: &str) -> Result<ExchangeRate> {
        let data = self.fetch_quotes("live", from, &[to], None).await?;
        let rate = data.quote(from, to)?;
        let timestamp = data.timestamp();
        let date = timestamp.format(DATE_FORMAT).to_string();
        Ok(ExchangeRate::new(from, to, rate, timestamp, date))
    }

    async fn historical_rate(&self, from: &str, to: &str, date: &str) -> Result<ExchangeRate> {
        let data = self
            .fetch_quotes("historical", from, &[to], Some(date))
            .await?;
        let rate = data.quote(from, to)?;
        Ok(ExchangeRate::new(
            from,
            to,
            rate,
            data.timestamp(),
            date.to_string(),
        ))
    }

    async fn live_rates(&self, base: &str) -> Result<HashMap<String, f64>> {
        let quotes = quote_currencies(base);
        let data = self.fetch_quotes("live", base, &quotes, None).await?;

        let rates: HashMap<String, f64> = data
            .quotes
            .iter()
            .filter_map(|(pair, rate)| {
                let code = pair.strip_prefix(base)?;
                (quotes.iter().any(|q| *q == code) && is_usable(*rate))
                    .then(|| (code.to_string(), *rate))
            })
            .collect();

        if rates.is_empty() {
            bail!("No usable quotes for base currency: {}", base);
        }
        Ok(rates)
    }
}

fn is_usable(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0
}

#[derive(Debug, Deserialize)]
struct QuotesResponse {
    success: bool,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    quotes: HashMap<String, f64>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    info: String,
}

impl QuotesResponse {
    fn quote(&self, from: &str, to: &str) -> Result<f64> {
        let pair = format!("{from}{to}");
        let rate = *self
            .quotes
            .get(&pair)
            .ok_or_else(|| anyhow!("No quote found for currency pair: {}", pair))?;
        if !is_usable(rate) {
            bail!("Unusable quote {} for currency pair: {}", rate, pair);
        }
        Ok(rate)
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or_else(Utc::now)
    }
}

#[async_trait]
impl RateProvider for ExchangeHostProvider {
    #[instrument(name = "LatestRateFetch", skip(self), fields(from = %from, to = %to))]
    async fn get_latest_rate(&self, from: &str, to: &str) -> Result<ExchangeRate> {
        match self.live_rate(from, to).await {
            Ok(rate) => Ok(rate),
            Err(e) => {
                warn!("Using offline latest rate: {e:#}");
                Ok(fallback::latest_rate(from, to))
            }
        }
    }

    #[instrument(
        name = "HistoricalRateFetch",
        skip(self),
        fields(from = %from, to = %to, date = %date)
    )]
    async fn get_historical_rate(&self, from: &str, to: &str, date: &str) -> Result<ExchangeRate> {
        match self.historical_rate(from, to, date).await {
            Ok(rate) => Ok(rate),
            Err(e) => {
                warn!("Using offline historical rate: {e:#}");
                Ok(fallback::historical_rate(from, to, date))
            }
        }
    }

    #[instrument(name = "LatestRatesFetch", skip(self), fields(base = %base))]
    async fn get_all_latest_rates(&self, base: &str) -> Result<HashMap<String, f64>> {
        match self.live_rates(base).await {
            Ok(rates) => Ok(rates),
            Err(e) => {
                warn!("Using offline rate table: {e:#}");
                Ok(fallback::fallback_rates(base))
            }
        }
    }
}
