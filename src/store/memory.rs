use crate::core::cache::CacheError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default period of the background eviction sweep.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Shortest period the sweeper will run at.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

struct CacheEntry {
    payload: Vec<u8>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now <= self.expires_at
    }
}

/// In-memory expiring key-value store.
///
/// Values are stored as JSON and decoded on every read, so a caller never
/// holds a reference into cached state.
pub struct MemoryCache {
    inner: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Stores `value` under `key` until `ttl` elapses, replacing any previous entry.
    pub async fn set<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(value).map_err(|source| CacheError::Codec {
            key: key.to_string(),
            source,
        })?;
        let entry = CacheEntry {
            payload,
            expires_at: Instant::now() + ttl,
        };

        let mut entries = self.inner.write().await;
        debug!("Cache PUT for key: {}", key);
        entries.insert(key.to_string(), entry);
        Ok(())
    }

    /// Returns a fresh copy of the value under `key`.
    ///
    /// An expired entry is removed before the miss is reported.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, CacheError> {
        {
            let entries = self.inner.read().await;
            match entries.get(key) {
                None => {
                    debug!("Cache MISS for key: {}", key);
                    return Err(CacheError::NotFound(key.to_string()));
                }
                Some(entry) if entry.is_live(Instant::now()) => {
                    debug!("Cache HIT for key: {}", key);
                    return decode(key, &entry.payload);
                }
                Some(_) => {}
            }
        }

        let mut entries = self.inner.write().await;
        // A writer may have replaced the entry between the two locks.
        if let Some(entry) = entries.get(key) {
            if entry.is_live(Instant::now()) {
                debug!("Cache HIT for key: {}", key);
                return decode(key, &entry.payload);
            }
            entries.remove(key);
        }
        debug!("Cache entry expired for key: {}", key);
        Err(CacheError::Expired(key.to_string()))
    }

    pub async fn delete(&self, key: &str) {
        let mut entries = self.inner.write().await;
        entries.remove(key);
        debug!("Cache REMOVE for key: {}", key);
    }

    pub async fn clear(&self) {
        let mut entries = self.inner.write().await;
        entries.clear();
        debug!("Cache CLEAR");
    }

    /// Whether an entry exists for `key`, expired or not.
    pub async fn contains_key(&self, key: &str) -> bool {
        self.inner.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Drops every expired entry and returns how many were removed.
    pub async fn evict_expired(&self) -> usize {
        let mut entries = self.inner.write().await;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Runs [`MemoryCache::evict_expired`] every `interval` until `shutdown` fires.
    ///
    /// Intervals shorter than [`MIN_SWEEP_INTERVAL`] are raised to it.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        if interval < MIN_SWEEP_INTERVAL {
            warn!(?interval, "Sweep interval too short, using {:?}", MIN_SWEEP_INTERVAL);
        }
        let interval = interval.max(MIN_SWEEP_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; nothing can have expired yet.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Cache sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = self.evict_expired().await;
                        if evicted > 0 {
                            debug!(evicted, "Evicted expired cache entries");
                        }
                    }
                }
            }
        })
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

fn decode<T: DeserializeOwned>(key: &str, payload: &[u8]) -> Result<T, CacheError> {
    serde_json::from_slice(payload).map_err(|source| CacheError::Codec {
        key: key.to_string(),
        source,
    })
}
