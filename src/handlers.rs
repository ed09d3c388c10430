// HTTP handlers for the quote API

use axum::{extract::State, response::Json};
use validator::Validate;

use crate::error::{ApiError, ErrorResponse};
use crate::models::{CreateQuoteRequest, HealthResponse};
use crate::pricing::{MetricsSummary, Quote};
use crate::AppState;

/// Handler for POST /api/quotes
/// Prices one item for a destination without reserving anything
#[utoipa::path(
    post,
    path = "/api/quotes",
    request_body = CreateQuoteRequest,
    responses(
        (status = 200, description = "Itemized quote", body = Quote),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Item or edition not found", body = ErrorResponse),
        (status = 409, description = "Item is not sellable", body = ErrorResponse),
        (status = 422, description = "Print cost or exchange rate not configured", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "quotes"
)]
pub async fn create_quote(
    State(state): State<AppState>,
    Json(payload): Json<CreateQuoteRequest>,
) -> Result<Json<Quote>, ApiError> {
    tracing::debug!(
        "Quote requested for item {} ({}) to {}",
        payload.item_id,
        payload.format,
        payload.destination_country
    );

    payload.validate()?;
    let request = payload.into_quote_request()?;

    let quote = state.engine.get_quote(&request).await?;

    tracing::info!(
        "Quoted item {} x{}: {} {}",
        quote.item_id,
        quote.qty,
        quote.total_minor,
        quote.currency
    );
    Ok(Json(quote))
}

/// Handler for GET /api/pricing/metrics
/// Returns quote latency, rule cache and rate refresh counters
#[utoipa::path(
    get,
    path = "/api/pricing/metrics",
    responses(
        (status = 200, description = "Pricing metrics", body = MetricsSummary)
    ),
    tag = "pricing"
)]
pub async fn get_pricing_metrics(State(state): State<AppState>) -> Json<MetricsSummary> {
    Json(state.engine.metrics().summary())
}

/// Handler for GET /health
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let rates = state.rates.snapshot();
    Json(HealthResponse {
        status: "ok".to_string(),
        base_currency: rates.base().to_string(),
        rates_loaded: rates.len(),
        rates_as_of: rates.as_of(),
    })
}
