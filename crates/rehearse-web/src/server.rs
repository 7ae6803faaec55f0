//! Axum server setup and router construction.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::error;

use crate::api::{self, AppState};

/// Build the full axum router.
///
/// The router serves:
/// - REST API at `/api/*`
/// - The embedded UI at `/`, or the files under `static_dir` when given
pub fn build_router(state: AppState, static_dir: Option<PathBuf>) -> Router {
    // CORS layer for a UI served from another origin during development.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/api/config", get(api::get_config))
        .route("/api/logs", get(api::get_logs))
        .route("/api/sessions", post(api::create_session))
        .route("/api/sessions/{id}", get(api::get_session))
        .route("/api/sessions/{id}/reset", post(api::reset_session))
        .route("/api/sessions/{id}/job", post(api::analyze_job))
        .route("/api/sessions/{id}/start", post(api::start_interview))
        .route("/api/sessions/{id}/answer", post(api::submit_answer))
        .route("/api/sessions/{id}/evaluate", post(api::evaluate_answer))
        .with_state(state);

    let router = match static_dir {
        Some(dir) => Router::new()
            .merge(api_routes)
            .fallback_service(ServeDir::new(dir)),
        None => Router::new()
            .route("/", get(api::index))
            .merge(api_routes),
    };

    router.layer(cors)
}

/// Bind `bind_addr`, serve `router` on a Tokio task and return the bound address.
pub async fn start_server(router: Router, bind_addr: SocketAddr) -> Result<SocketAddr, String> {
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|e| format!("failed to bind {bind_addr}: {e}"))?;
    let addr = listener
        .local_addr()
        .map_err(|e| format!("failed to read bound address: {e}"))?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!("Web server stopped: {e}");
        }
    });

    Ok(addr)
}
