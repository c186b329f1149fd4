//! HTTP surface over [`RateResolver`].
//!
//! Handlers only parse query parameters and render results; every rule about
//! currencies, dates and caching lives in the resolver.

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::core::currency::SUPPORTED_CURRENCIES;
use crate::core::error::ServiceError;
use crate::core::rate::{
    ConversionRequest, ConversionResult, HistoricalRatesSeries, LatestRatesSnapshot,
};
use crate::resolver::RateResolver;

pub const SERVICE_NAME: &str = "fxrates";
const DEFAULT_BASE_CURRENCY: &str = "USD";

type AppState = Arc<RateResolver>;

/// Error body returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    pub message: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    error: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error,
            message: message.into(),
        }
    }

    fn from_service(error: &'static str, source: ServiceError) -> Self {
        let status = if source.is_input_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::BAD_GATEWAY
        };
        Self {
            status,
            error,
            message: source.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.error.to_string(),
            code: self.status.as_u16(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConvertParams {
    from: Option<String>,
    to: Option<String>,
    amount: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LatestParams {
    base: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HistoricalParams {
    from: Option<String>,
    to: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub fn router(resolver: Arc<RateResolver>) -> Router {
    let api = Router::new()
        .route("/convert", get(convert))
        .route("/latest", get(latest_rates))
        .route("/historical", get(historical_rates))
        .route("/currencies", get(supported_currencies));

    Router::new()
        .route("/health", get(health))
        .route("/convert", get(convert))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(resolver)
}

/// Serves [`router`] on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    resolver: Arc<RateResolver>,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = listener
        .local_addr()
        .context("Failed to read listener address")?;
    info!("Server listening on {}", addr);

    axum::serve(listener, router(resolver))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("HTTP server failed")
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn convert(
    State(resolver): State<AppState>,
    Query(params): Query<ConvertParams>,
) -> Result<Json<ConversionResult>, ApiError> {
    let (Some(from), Some(to)) = (non_empty(params.from), non_empty(params.to)) else {
        return Err(ApiError::bad_request(
            "missing_parameters",
            "from and to currencies are required",
        ));
    };

    let amount = match non_empty(params.amount) {
        Some(raw) => raw
            .parse::<f64>()
            .ok()
            .filter(|amount| amount.is_finite())
            .ok_or_else(|| {
                ApiError::bad_request("invalid_amount", "amount must be a valid number")
            })?,
        None => 1.0,
    };

    let request = ConversionRequest {
        from,
        to,
        amount,
        date: non_empty(params.date),
    };

    resolver.convert(&request).await.map(Json).map_err(|e| {
        error!("Conversion failed: {}", e);
        ApiError::from_service("conversion_failed", e)
    })
}

async fn latest_rates(
    State(resolver): State<AppState>,
    Query(params): Query<LatestParams>,
) -> Result<Json<LatestRatesSnapshot>, ApiError> {
    let base = non_empty(params.base).unwrap_or_else(|| DEFAULT_BASE_CURRENCY.to_string());

    resolver.latest_rates(&base).await.map(Json).map_err(|e| {
        error!("Failed to get latest rates: {}", e);
        ApiError::from_service("fetch_failed", e)
    })
}

async fn historical_rates(
    State(resolver): State<AppState>,
    Query(params): Query<HistoricalParams>,
) -> Result<Json<HistoricalRatesSeries>, ApiError> {
    let (Some(from), Some(to), Some(start), Some(end)) = (
        non_empty(params.from),
        non_empty(params.to),
        non_empty(params.start_date),
        non_empty(params.end_date),
    ) else {
        return Err(ApiError::bad_request(
            "missing_parameters",
            "from, to, start_date, and end_date are required",
        ));
    };

    resolver
        .historical_rates(&from, &to, &start, &end)
        .await
        .map(Json)
        .map_err(|e| {
            error!("Failed to get historical rates: {}", e);
            ApiError::from_service("fetch_failed", e)
        })
}

async fn supported_currencies() -> Json<Value> {
    Json(json!({
        "currencies": SUPPORTED_CURRENCIES,
        "count": SUPPORTED_CURRENCIES.len(),
    }))
}
