use crate::App;
use crate::refresher::RateRefresher;
use crate::server;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Runs the HTTP server with the cache sweeper and the rate refresher until
/// the process is asked to stop.
pub async fn serve(app: &App) -> Result<()> {
    let config = &app.config;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    let shutdown = CancellationToken::new();
    let sweeper = Arc::clone(&app.cache).spawn_sweeper(config.sweep_interval(), shutdown.clone());
    let refresher = config.refresh.enabled.then(|| {
        RateRefresher::new(
            Arc::clone(&app.provider),
            Arc::clone(&app.cache),
            config.latest_ttl(),
        )
        .spawn(config.refresh_interval(), shutdown.clone())
    });

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutting down server...");
        signal_token.cancel();
    });

    let result = server::serve(listener, Arc::clone(&app.resolver), shutdown.clone()).await;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        error!("Cache sweeper task failed: {}", e);
    }
    if let Some(refresher) = refresher
        && let Err(e) = refresher.await
    {
        error!("Rate refresher task failed: {}", e);
    }

    info!("Server exited");
    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
