pub mod cli;
pub mod core;
pub mod providers;
pub mod refresher;
pub mod resolver;
pub mod server;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::currency::RateProvider;
use crate::core::rate::ConversionRequest;
use crate::providers::ExchangeHostProvider;
use crate::resolver::{RateResolver, ResolverSettings};
use crate::store::MemoryCache;
use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

pub enum AppCommand {
    Serve,
    Convert(ConversionRequest),
    Latest {
        base: String,
    },
    Historical {
        from: String,
        to: String,
        start: String,
        end: String,
    },
}

/// The shared components of one process: a single cache and provider used by
/// both request handling and the background refresher.
pub struct App {
    pub config: AppConfig,
    pub cache: Arc<MemoryCache>,
    pub provider: Arc<dyn RateProvider>,
    pub resolver: Arc<RateResolver>,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        let provider: Arc<dyn RateProvider> =
            Arc::new(ExchangeHostProvider::new(&config.provider)?);
        Ok(Self::with_provider(config, provider))
    }

    pub fn with_provider(config: AppConfig, provider: Arc<dyn RateProvider>) -> Self {
        let cache = Arc::new(MemoryCache::new());
        let resolver = Arc::new(RateResolver::new(
            Arc::clone(&provider),
            Arc::clone(&cache),
            ResolverSettings::from(&config),
        ));
        Self {
            config,
            cache,
            provider,
            resolver,
        }
    }
}

pub async fn run_command(command: AppCommand, config: AppConfig) -> Result<()> {
    debug!(
        base_url = %config.provider.base_url,
        port = config.server.port,
        "Loaded config"
    );
    let app = App::new(config)?;

    match command {
        AppCommand::Serve => cli::serve::serve(&app).await,
        AppCommand::Convert(request) => {
            println!("{}", cli::lookup::convert(&app.resolver, &request).await?);
            Ok(())
        }
        AppCommand::Latest { base } => {
            println!("{}", cli::lookup::latest(&app.resolver, &base).await?);
            Ok(())
        }
        AppCommand::Historical {
            from,
            to,
            start,
            end,
        } => {
            let output = cli::lookup::historical(&app.resolver, &from, &to, &start, &end).await?;
            println!("{output}");
            Ok(())
        }
    }
}
