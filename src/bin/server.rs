//! Server: reads settings from the environment, ensures the database and tables exist,
//! then serves the health routes and the `/api/v1` resources.

use sensor_registry::{app, apply_schema, ensure_database_exists, AppState, Model, PgStore, Settings};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sensor_registry=info,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    if settings.api_tokens.is_empty() {
        tracing::warn!("API_TOKENS is empty; every /api/v1 request will be rejected");
    }

    ensure_database_exists(&settings.database_url).await?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await?;

    let model = Model::standard()?;
    apply_schema(&pool, &model).await?;

    let state = AppState::new(Arc::new(PgStore::new(pool)), model, settings.api_tokens.clone());
    let router = app(state, settings.body_limit_bytes);

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
