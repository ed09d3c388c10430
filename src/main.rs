use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use artwork_quote_api::{
    config::PricingConfig,
    create_router, db,
    pricing::{Collaborators, PerformanceMetrics, QuoteEngine, RateRefresher, RateStore, RateTable},
    stores::{CachedRuleStore, PgStores},
    AppState,
};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging; RUST_LOG overrides the default
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Artwork Quote API - Starting...");

    // Get configuration from environment variables
    let config = Arc::new(PricingConfig::from_env().expect("Invalid pricing configuration"));
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set in environment");
    let host = std::env::var("HOST")
        .unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string());

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&database_url)
        .await
        .expect("Failed to create database pool");

    // Run SQLx migrations on startup
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations completed successfully");

    let metrics = PerformanceMetrics::new();
    let stores = Arc::new(PgStores::new(db_pool, config.base_currency));

    // Promotional rules are read through a TTL cache
    let rules = Arc::new(CachedRuleStore::with_metrics(
        stores.clone(),
        config.rule_cache_ttl,
        metrics.clone(),
    ));
    match rules.warm().await {
        Ok(count) => tracing::info!("Loaded {} active pricing rules", count),
        Err(e) => tracing::warn!("Pricing rules not loaded at startup: {}", e),
    }

    // Exchange rates: load once before serving, then refresh in the background
    let rates = Arc::new(RateStore::new(RateTable::empty(config.base_currency)));
    let refresher = RateRefresher::new(
        stores.clone(),
        rates.clone(),
        config.rate_refresh_interval,
        metrics.clone(),
    );
    if !refresher.refresh_once().await {
        tracing::warn!("No exchange rates loaded; quotes outside {} will fail", config.base_currency);
    }
    let refresher_shutdown = refresher.shutdown_handle();
    let refresher_task = refresher.start();

    let engine = QuoteEngine::new(
        config.clone(),
        Collaborators::shared(stores).with_rules(rules),
        rates.clone(),
        metrics.clone(),
    );
    let app = create_router(AppState {
        engine: Arc::new(engine),
        rates,
    });

    // Start the Axum server
    let addr = format!("{}:{}", host, port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Artwork Quote API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    refresher_shutdown.notify_one();
    if let Err(e) = refresher_task.await {
        tracing::warn!("Rate refresher did not stop cleanly: {}", e);
    }
    metrics.log_summary();
}
