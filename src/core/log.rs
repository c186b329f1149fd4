use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

/// Installs the global subscriber. `RUST_LOG` takes precedence over `default_level`.
pub fn init_logging(verbose: bool, default_level: &str) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(build_filter(verbose, default_level, rust_log.as_deref()))
        .init();
}

/// `rust_log` directives when present and valid, otherwise the crate and its
/// request tracing at `default_level` (debug when verbose) and everything else at info.
fn build_filter(verbose: bool, default_level: &str, rust_log: Option<&str>) -> EnvFilter {
    if let Some(directives) = rust_log.filter(|d| !d.trim().is_empty())
        && let Ok(filter) = EnvFilter::try_new(directives)
    {
        return filter;
    }

    let app_level = if verbose {
        LevelFilter::DEBUG
    } else {
        default_level.parse().unwrap_or(LevelFilter::INFO)
    };
    EnvFilter::new(format!("info,fxrates={app_level},tower_http={app_level}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;
    use tracing_subscriber::registry;

    fn enabled_under(filter: EnvFilter) -> (bool, bool, bool) {
        let subscriber = registry().with(filter);
        tracing::subscriber::with_default(subscriber, || {
            (
                tracing::enabled!(target: "fxrates::resolver", Level::DEBUG),
                tracing::enabled!(target: "tower_http::trace::on_response", Level::DEBUG),
                tracing::enabled!(target: "hyper::proto", Level::DEBUG),
            )
        })
    }

    // One test so the shared callsites only ever see one scoped filter at a time.
    #[test]
    fn test_filter_selection() {
        // RUST_LOG wins over the configured level
        let filter = build_filter(false, "info", Some("fxrates=debug,tower_http=debug"));
        assert_eq!(enabled_under(filter), (true, true, false));

        assert_eq!(enabled_under(build_filter(false, "info", None)), (false, false, false));
        assert_eq!(enabled_under(build_filter(false, "debug", None)), (true, true, false));
        assert_eq!(enabled_under(build_filter(true, "warn", None)), (true, true, false));

        // Unusable RUST_LOG falls back to the configured level
        let filter = build_filter(false, "debug", Some("fxrates=notalevel"));
        assert_eq!(enabled_under(filter), (true, true, false));
        assert_eq!(enabled_under(build_filter(false, "debug", Some("  "))), (true, true, false));
    }
}
