//! Canonical file store: router assembly and shared state.

pub mod dispatch;
pub mod handlers;
pub mod locks;

use axum::{
    routing::{get, post},
    Router,
};
use dispatch::ChangeDispatcher;
use locks::WriteLockRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

/// Server construction parameters.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory holding the canonical copy of every file.
    pub mount: PathBuf,
    /// Optional pause between streamed chunks, pacing transfers so
    /// deadline expiry mid-stream can be exercised. None in production.
    pub chunk_pause: Option<Duration>,
}

impl ServerConfig {
    pub fn new(mount: PathBuf) -> Self {
        Self {
            mount,
            chunk_pause: None,
        }
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct ServerState {
    pub mount: PathBuf,
    pub locks: Arc<WriteLockRegistry>,
    pub changes: Arc<ChangeDispatcher>,
    pub chunk_pause: Option<Duration>,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            mount: config.mount,
            locks: Arc::new(WriteLockRegistry::new()),
            changes: Arc::new(ChangeDispatcher::new()),
            chunk_pause: config.chunk_pause,
        }
    }

    /// Spawn the dispatcher task that completes parked watch
    /// subscriptions. Call once per server.
    pub fn spawn_dispatcher(&self) -> JoinHandle<()> {
        let changes = Arc::clone(&self.changes);
        let mount = self.mount.clone();
        tokio::spawn(async move { changes.run(mount).await })
    }
}

/// Build the server router over the given state.
pub fn create_router(state: ServerState) -> Router {
    Router::new()
        .route("/files", get(handlers::list_files))
        .route(
            "/files/:filename",
            get(handlers::fetch_file)
                .post(handlers::store_file)
                .delete(handlers::delete_file),
        )
        .route("/stat/:filename", get(handlers::stat_file))
        .route("/locks", post(handlers::request_lock))
        .route("/watch", get(handlers::watch_changes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
