//! API endpoints.

mod admin;
mod club;

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};

use crate::middleware::AppState;
use crate::sse;

pub use club::{IssueResponse, ScreenResponse};

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/club", club::router().merge(sse::router()))
        .nest("/admin", admin::router())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
