//! HTTP API layer for clubhub.
//!
//! This crate serves the club dashboards:
//!
//! - **Endpoints**: club administration screens, gated actions, super-admin overview
//! - **Extractors**: session and role checks
//! - **Middleware**: session propagation from the auth gateway
//! - **Streaming**: Server-Sent Events for live enforcement and countdown
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;
pub mod sse;

use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use endpoints::router;
pub use middleware::{AppState, Session};

/// Build the application with its middleware stack.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(router())
        .layer(axum::middleware::from_fn(middleware::session_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
