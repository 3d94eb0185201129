//! SOBIE research submission engine
//!
//! Carries a paper from draft through peer review, presentation and the
//! optional proceedings track, behind a JSON API.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod authorship;
pub mod collaboration;
pub mod config;
pub mod db;
pub mod directory;
pub mod engine;
pub mod error;
pub mod notify;
pub mod proceedings;
pub mod review;
pub mod routes;
pub mod state;
pub mod storage;
pub mod submission;

pub use engine::{Engine, EngineSettings};
pub use error::{Error, Result};
pub use state::AppState;

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .nest("/api", routes::api_routes())
        .merge(routes::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
