pub mod access;
pub mod admin;
pub mod auth;
pub mod dashboard;
pub mod profile;
pub mod session;
pub mod training;

use crate::middleware::page_guard;
use crate::state::SharedState;
use axum::{
    middleware,
    routing::{get, get_service},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::router(state.clone()))
        .nest("/access", access::router(state.clone()))
        .nest("/dashboard", dashboard::router(state.clone()))
        .nest("/profile", profile::router(state.clone()))
        .nest("/training", training::router(state.clone()))
        .nest("/admin", admin::router(state))
}

/// API routes plus the app shell from `static_dir`. Every page path that
/// falls through to the shell passes the page guard first; file requests
/// like `/app.js` are served without it.
pub fn app(state: SharedState, static_dir: &str) -> Router {
    let shell = ServeDir::new(static_dir).not_found_service(ServeFile::new(format!("{static_dir}/index.html")));
    let guarded_shell =
        get_service(shell).layer(middleware::from_fn_with_state(state.clone(), page_guard));

    Router::new()
        .merge(routes(state))
        .nest_service("/static", ServeDir::new(static_dir))
        .fallback_service(guarded_shell)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}
