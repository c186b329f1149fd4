//! One-shot lookups printed as JSON.

use crate::core::rate::ConversionRequest;
use crate::resolver::RateResolver;
use anyhow::{Context, Result};
use serde::Serialize;

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to render result as JSON")
}

pub async fn convert(resolver: &RateResolver, request: &ConversionRequest) -> Result<String> {
    let result = resolver.convert(request).await?;
    to_json(&result)
}

pub async fn latest(resolver: &RateResolver, base: &str) -> Result<String> {
    let snapshot = resolver.latest_rates(base).await?;
    to_json(&snapshot)
}

pub async fn historical(
    resolver: &RateResolver,
    from: &str,
    to: &str,
    start: &str,
    end: &str,
) -> Result<String> {
    let series = resolver.historical_rates(from, to, start, end).await?;
    to_json(&series)
}
