//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, MemoryStore, OpenAiReportAdapter},
    config::{Config, StorageBackend},
    error::ApiError,
    web::{build_router, AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use research_assistant_core::ports::{ReportGenerationService, ResearchStore};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Connects the configured storage backend.
async fn connect_store(config: &Config) -> Result<Arc<dyn ResearchStore>, ApiError> {
    match &config.storage {
        StorageBackend::Memory => {
            warn!("Using the in-memory store; all data is lost on restart.");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Postgres { database_url } => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let db_adapter = DbAdapter::new(db_pool);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Ok(Arc::new(db_adapter))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for the shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections...");
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect the Store ---
    let store = connect_store(&config).await?;

    // --- 3. Initialize the Report Generator ---
    let report_adapter = match &config.openai_api_key {
        Some(api_key) => {
            let openai_client = Client::with_config(OpenAIConfig::new().with_api_key(api_key));
            let adapter: Arc<dyn ReportGenerationService> = Arc::new(OpenAiReportAdapter::new(
                openai_client,
                config.report_model.clone(),
            ));
            Some(adapter)
        }
        None => {
            warn!("OPENAI_API_KEY is not set; report generation is disabled.");
            None
        }
    };

    // --- 4. Build the Shared AppState and Router ---
    let app_state = Arc::new(AppState {
        store,
        config: config.clone(),
        report_adapter,
    });
    let app = build_router(app_state);

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped.");
    Ok(())
}
