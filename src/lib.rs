pub mod analytics;
pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod prescriptions;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use context::Actor;
pub use database::{Database, MemoryStore, Store};
pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

/// Build the HTTP router
pub fn app(state: AppState) -> Router {
    Router::new()
        .route(
            "/prescriptions",
            post(handlers::create_prescription).options(handlers::preflight),
        )
        .route(
            "/analytics/top-drugs",
            get(handlers::top_drugs).options(handlers::preflight),
        )
        .route("/health", get(handlers::health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
