//! Keeps the latest rate mappings warm independently of request traffic.

use crate::core::cache::latest_rates_key;
use crate::core::currency::{RateProvider, SUPPORTED_CURRENCIES};
use crate::store::MemoryCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Shortest period the refresh loop will run at.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(1);

pub struct RateRefresher {
    provider: Arc<dyn RateProvider>,
    cache: Arc<MemoryCache>,
    ttl: Duration,
}

impl RateRefresher {
    pub fn new(provider: Arc<dyn RateProvider>, cache: Arc<MemoryCache>, ttl: Duration) -> Self {
        Self {
            provider,
            cache,
            ttl,
        }
    }

    /// Rewrites the rate mapping of every supported base currency.
    ///
    /// Returns how many bases were refreshed; a failing base does not stop the rest.
    pub async fn refresh_all(&self) -> usize {
        let mut refreshed = 0;
        for base in SUPPORTED_CURRENCIES {
            let rates = match self.provider.get_all_latest_rates(base).await {
                Ok(rates) => rates,
                Err(e) => {
                    error!(base_currency = base, "Failed to update rates: {:#}", e);
                    continue;
                }
            };

            match self.cache.set(&latest_rates_key(base), &rates, self.ttl).await {
                Ok(()) => {
                    info!(base_currency = base, "Updated rates");
                    refreshed += 1;
                }
                Err(e) => error!(base_currency = base, "Failed to cache rates: {}", e),
            }
        }
        refreshed
    }

    /// Refreshes immediately, then every `interval` until `shutdown` fires.
    ///
    /// Intervals shorter than [`MIN_REFRESH_INTERVAL`] are raised to it.
    ///
    /// Shutdown also abandons a refresh that is still waiting on the provider.
    pub fn spawn(self, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        if interval < MIN_REFRESH_INTERVAL {
            warn!(?interval, "Refresh interval too short, using {:?}", MIN_REFRESH_INTERVAL);
        }
        let interval = interval.max(MIN_REFRESH_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    refreshed = self.refresh_all() => {
                        debug!(refreshed, "Rate refresh complete");
                    }
                }
            }
            debug!("Rate refresher stopped");
        })
    }
}
