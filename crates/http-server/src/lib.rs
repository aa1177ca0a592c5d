//! HTTP upload/download surface for the Echo node.
//!
//! Two routes: `POST /upload/{id}` streams a pre-authorized multipart body
//! to disk, `GET /download/{id}` serves a stored item after the Overseer
//! verifies the presented token. Everything else about who may do what is
//! the Overseer's problem.

mod download;
mod upload;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use echo_inventory::Inventory;
use echo_overseer_connection::ControlChannel;

/// Node-wide request/response timeout.
///
/// Multi-gigabyte transfers on slow links take hours; the default short
/// timeouts of most stacks would abort them.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10 * 60 * 60);

/// Shared state for the HTTP handlers.
pub struct AppState {
    pub inventory: Arc<Inventory>,
    pub overseer: Arc<dyn ControlChannel>,
}

/// Builds the router.
///
/// `overseer_origin` restricts CORS to the Overseer's web frontend, which
/// is where browsers performing uploads/downloads are served from.
pub fn router(state: AppState, overseer_origin: Option<HeaderValue>) -> Router {
    let cors = match overseer_origin {
        Some(origin) => CorsLayer::new().allow_origin(origin),
        None => CorsLayer::new(),
    };

    Router::new()
        .route("/upload/{id}", post(upload::handle))
        .route("/download/{id}", get(download::handle))
        .layer(DefaultBodyLimit::disable())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}
