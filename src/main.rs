use prescription_server::config::AppConfig;
use prescription_server::database::{run_migrations, Database};
use prescription_server::{app, AppState};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db.max_connections)
        .connect(&config.db.connection_string())
        .await?;

    tracing::info!(
        max_connections = config.db.max_connections,
        "database connected"
    );

    if config.run_migrations {
        run_migrations(&pool).await?;
    }

    let state = AppState::new(Arc::new(Database::new(pool)));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "prescription server listening");

    axum::serve(listener, app(state)).await?;

    Ok(())
}
