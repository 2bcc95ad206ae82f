//! Civic Feed Service
//!
//! HTTP service for civic issue reports: report and comment ingestion with
//! urgency scoring, the running per-post score, and the ranked feed.

pub mod budget;
pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod ingestion;
pub mod ml;
pub mod models;
pub mod provider;
pub mod ranker;
pub mod repository;
pub mod score_store;
pub mod state;

use std::sync::Arc;

use axum::{
  http::{header, HeaderValue, Method},
  routing::{get, post},
  Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

pub use config::{Config, ScoringMode};
pub use error::ApiError;
pub use state::AppState;

/// CORS for a single configured origin, or permissive when none is set.
fn cors_layer(allowed_origin: Option<&str>) -> CorsLayer {
  let Some(origin) = allowed_origin else {
    return CorsLayer::permissive();
  };
  match HeaderValue::from_str(origin) {
    Ok(origin) => CorsLayer::new()
      .allow_origin(origin)
      .allow_credentials(true)
      .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
      .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
    Err(_) => {
      warn!(origin, "ALLOWED_ORIGIN is not a valid header value, using permissive CORS");
      CorsLayer::permissive()
    }
  }
}

pub fn router(state: Arc<AppState>) -> Router {
  let cors = cors_layer(state.config.allowed_origin.as_deref());

  Router::new()
    .route("/health", get(handlers::health))
    .route("/feed", get(handlers::feed))
    .route("/report", post(handlers::report))
    .route("/comment", post(handlers::comment))
    .route("/upvote", post(handlers::upvote))
    .route("/predict-urgency", post(handlers::predict_urgency))
    .route("/classify-image", post(handlers::classify_image))
    .route("/api/admin/post-status", post(handlers::admin_update_status))
    .route("/api/admin/issues", get(handlers::admin_issues))
    .layer(TraceLayer::new_for_http())
    .layer(cors)
    .with_state(state)
}
