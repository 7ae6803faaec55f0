//! Browser-based mock-interview UI for `rehearse`.
//!
//! `rehearse-web` serves a single-page UI and a REST API on axum. Each
//! browser gets its own [`InterviewSession`](rehearse::session::InterviewSession)
//! held in a [`SessionStore`]; every answer goes through the guard pipeline
//! before the interviewer sees it.
//!
//! # Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use rehearse::prelude::*;
//! use rehearse_web::{WebConfig, spawn_web};
//!
//! let config = Arc::new(AppConfig::default());
//! let client = OpenAiClient::from_config(api_key_from_env()?, &config)?;
//! let activity = init_tracing("info");
//!
//! let addr = spawn_web(Arc::new(client), config, activity, WebConfig::default()).await?;
//! println!("Web UI: http://{addr}");
//! ```
//!
//! # Routes
//!
//! ```text
//! GET  /                             embedded UI
//! GET  /api/config                   theme, limits, settings options
//! GET  /api/logs?limit=&level=       recent log lines
//! POST /api/sessions                 new session (201)
//! GET  /api/sessions/{id}            snapshot
//! POST /api/sessions/{id}/reset      new interview
//! POST /api/sessions/{id}/job        {"job_description"}       422 if not a JD
//! POST /api/sessions/{id}/start      {"difficulty","persona","role"}  409 once running
//! POST /api/sessions/{id}/answer     {"answer"}                429 / 422 on rejection
//! POST /api/sessions/{id}/evaluate   structured evaluation     409 nothing yet
//! ```
//!
//! Provider failures return 502 with `{"error": ...}`. Sessions idle for
//! longer than [`WebConfig::session_ttl`] are dropped; their ids then return
//! 404 and the UI creates a new session.

mod api;
mod server;
pub mod snapshot;
pub mod store;

pub use api::{AppState, INDEX_HTML};
pub use snapshot::SessionSnapshot;
pub use store::SessionStore;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rehearse::backend::LlmBackend;
use rehearse::config::AppConfig;
use rehearse::telemetry::ActivityLog;

/// Configuration for the web server.
pub struct WebConfig {
    /// Address to bind to. Default: `127.0.0.1:3001`.
    pub bind_addr: SocketAddr,
    /// Directory served instead of the embedded UI.
    pub static_dir: Option<PathBuf>,
    /// Idle time after which a session is dropped. `None` keeps sessions
    /// for the life of the process. Default: two hours.
    pub session_ttl: Option<Duration>,
}

/// Default idle lifetime of a session.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Longest pause between two idle-session sweeps.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
            static_dir: None,
            session_ttl: Some(DEFAULT_SESSION_TTL),
        }
    }
}

/// Spawn the web server on a Tokio task and return the bound address.
///
/// The server runs until the Tokio runtime shuts down.
///
/// # Arguments
///
/// * `backend`: Provider used for every session.
/// * `config`: Application configuration (models, guard limits, theme).
/// * `activity`: Log served at `/api/logs`; usually the one returned by
///   [`init_tracing`](rehearse::telemetry::init_tracing).
/// * `web_config`: Server configuration.
pub async fn spawn_web(
    backend: Arc<dyn LlmBackend>,
    config: Arc<AppConfig>,
    activity: ActivityLog,
    web_config: WebConfig,
) -> Result<SocketAddr, String> {
    let store = SessionStore::new();
    if let Some(ttl) = web_config.session_ttl {
        let every = ttl.clamp(Duration::from_secs(1), MAX_SWEEP_INTERVAL);
        store.spawn_sweeper(ttl, every);
    }
    let state = AppState {
        backend,
        config,
        store,
        activity,
    };
    let router = server::build_router(state, web_config.static_dir);
    server::start_server(router, web_config.bind_addr).await
}
