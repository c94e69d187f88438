//! Combines the feature module routers into the unified API surface.

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::shared::state::AppState;

async fn health() -> &'static str {
    "ok"
}

pub fn configure_api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .merge(crate::tickets::configure_routes())
        .merge(crate::rentals::configure_routes())
        .merge(crate::notifications::configure_routes())
}
