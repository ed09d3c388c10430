// Artwork Quote API
//
// HTTP surface over the price quote engine. Quotes are computed on
// demand and never persisted.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod pricing;
pub mod stores;
pub mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use error::ErrorResponse;
use models::{CreateQuoteRequest, HealthResponse};
use pricing::{MetricsSummary, Quote, QuoteEngine, RateStore, UnitBreakdown};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_quote,
        handlers::get_pricing_metrics,
        handlers::health,
    ),
    components(
        schemas(CreateQuoteRequest, Quote, UnitBreakdown, MetricsSummary, HealthResponse, ErrorResponse)
    ),
    tags(
        (name = "quotes", description = "Price quotes for originals and print editions"),
        (name = "pricing", description = "Pricing engine diagnostics"),
        (name = "health", description = "Service health")
    ),
    info(
        title = "Artwork Quote API",
        version = "1.0.0",
        description = "Itemized, currency-aware price quotes for artworks and prints"
    )
)]
pub struct ApiDoc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QuoteEngine>,
    pub rates: Arc<RateStore>,
}

/// Creates and configures the application router
/// Maps all API endpoints to their handlers and adds CORS middleware
pub fn create_router(state: AppState) -> Router {
    use tower_http::cors::{Any, CorsLayer};

    // Configure CORS to allow all origins, methods, and headers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // API routes
        .route("/api/quotes", post(handlers::create_quote))
        .route("/api/pricing/metrics", get(handlers::get_pricing_metrics))
        .route("/health", get(handlers::health))
        .layer(cors)
        .with_state(state)
}
