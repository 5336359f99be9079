pub mod health;
pub mod mapping;
pub mod session;
pub mod tabs;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Popup session
        .route("/api/v1/session", get(session::handle_get_session))
        .route("/api/v1/session/login", post(session::handle_login))
        .route("/api/v1/session/logout", post(session::handle_logout))
        // Content-script tabs
        .route("/api/v1/tabs", post(tabs::handle_open_tab))
        .route(
            "/api/v1/tabs/:id/document",
            put(tabs::handle_replace_document),
        )
        .route(
            "/api/v1/tabs/:id",
            axum::routing::delete(tabs::handle_close_tab),
        )
        .route("/api/v1/tabs/:id/detach", post(tabs::handle_detach))
        .route("/api/v1/tabs/:id/scan", post(tabs::handle_scan))
        .route("/api/v1/tabs/:id/fill", post(tabs::handle_fill))
        .route("/api/v1/tabs/:id/mutations", get(tabs::handle_mutations))
        // Stateless mapping
        .route("/api/v1/map", post(mapping::handle_map))
        .with_state(state)
}
