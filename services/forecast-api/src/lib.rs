//! Forecast API service library.
//!
//! HTTP endpoints for nearest-point and bounding-box lookups over the GRIB2
//! files found under a forecasts directory.

pub mod cleanup;
pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::state::AppState;

/// Build the router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let timeout = state.config.request_timeout;

    Router::new()
        .route("/", get(handlers::health::home_handler))
        .route("/health", get(handlers::health::health_handler))
        .route("/metrics", get(handlers::health::metrics_handler))
        .route("/get-grib-data", get(handlers::grib_data::grib_data_handler))
        .route(
            "/get-grib-data-with-bbox",
            get(handlers::bbox::bbox_handler),
        )
        // Middleware
        .layer(Extension(state))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
