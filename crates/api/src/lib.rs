//! HTTP API server with observability for the marketplace backend.
//!
//! Provides the order placement endpoint alongside account, session and
//! catalog endpoints, with structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod session;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use store::MarketplaceStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: MarketplaceStore>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/", get(routes::accounts::status::<S>))
        .route("/health", get(routes::health::check))
        .route("/new/account", post(routes::accounts::register::<S>))
        .route("/login", post(routes::accounts::login::<S>))
        .route("/logout", post(routes::accounts::logout::<S>))
        .route("/new/order", post(routes::orders::create::<S>))
        .route("/list/transaction", get(routes::orders::list::<S>))
        .route("/new/item", post(routes::items::create::<S>))
        .route("/update/item/{id}", post(routes::items::update::<S>))
        .route("/list/items", get(routes::items::list::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over `store` using the configured limits.
pub fn create_default_state<S: MarketplaceStore>(store: S, config: &Config) -> Arc<AppState<S>> {
    Arc::new(AppState::new(
        store,
        config.session_max_age_secs,
        config.reserve_max_attempts,
    ))
}
