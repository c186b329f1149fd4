use crate::core::validate::MAX_HISTORY_DAYS;
use crate::store::memory::SWEEP_INTERVAL;
use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Sent as `access_key` when present.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Extra attempts after a transport failure, before falling back.
    pub retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            base_url: "https://api.exchangerate.host".to_string(),
            api_key: None,
            timeout_secs: 15,
            retries: 1,
            retry_delay_ms: 250,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub latest_ttl_secs: u64,
    pub historical_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            latest_ttl_secs: 60 * 60,
            historical_ttl_secs: 24 * 60 * 60,
            sweep_interval_secs: SWEEP_INTERVAL.as_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RefreshConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        RefreshConfig {
            enabled: true,
            interval_secs: 4 * 60 * 60,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub cache: CacheConfig,
    pub refresh: RefreshConfig,
    pub max_history_days: u64,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            server: ServerConfig::default(),
            provider: ProviderConfig::default(),
            cache: CacheConfig::default(),
            refresh: RefreshConfig::default(),
            max_history_days: MAX_HISTORY_DAYS,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads the configuration for a run and applies environment overrides.
    ///
    /// An explicit `path` must exist. Without one, the default config file is
    /// used when present and built-in defaults otherwise.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => {
                let default_path = Self::default_config_path()?;
                if default_path.exists() {
                    Self::load_from_path(&default_path)?
                } else {
                    debug!("No config file at {}, using defaults", default_path.display());
                    Self::default()
                }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the background tasks cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.cache.sweep_interval_secs == 0 {
            bail!("cache.sweep_interval_secs must be greater than zero");
        }
        if self.refresh.enabled && self.refresh.interval_secs == 0 {
            bail!("refresh.interval_secs (UPDATE_INTERVAL) must be greater than zero");
        }
        Ok(())
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "fxrates", "fxrates")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Overrides settings from environment-style variables.
    ///
    /// Numeric values that fail to parse leave the current setting untouched.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        override_parsed(&lookup, "PORT", &mut self.server.port);
        if let Some(api_key) = lookup("EXCHANGE_API_KEY") {
            self.provider.api_key = Some(api_key).filter(|key| !key.is_empty());
        }
        if let Some(base_url) = lookup("EXCHANGE_BASE_URL") {
            self.provider.base_url = base_url;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level;
        }
        override_parsed(&lookup, "CACHE_EXPIRATION", &mut self.cache.latest_ttl_secs);
        override_parsed(&lookup, "UPDATE_INTERVAL", &mut self.refresh.interval_secs);
        override_parsed(&lookup, "MAX_HISTORY_DAYS", &mut self.max_history_days);
    }

    pub fn latest_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.latest_ttl_secs)
    }

    pub fn historical_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.historical_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache.sweep_interval_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh.interval_secs)
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(value) = lookup(key) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => debug!("Ignoring unparseable value for {}: {}", key, value),
        }
    }
}
