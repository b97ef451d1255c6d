//! HTTP and WebSocket surface under `/api/v1`.
//!
//! Handlers are thin: they validate input, call the storage layer or the
//! [`Orchestrator`], and map [`StudioError`](crate::error::StudioError)
//! onto status codes with a JSON `{"detail": ...}` body.

mod routes;
mod ws;

use axum::Router;
use axum::routing::{get, post};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::broadcast::BroadcastChannel;
use crate::error::{Result, StudioError};
use crate::scheduler::DailyScheduler;
use crate::storage::{ImageStore, PromptFile, PromptHistory};
use crate::task::Orchestrator;

/// API path prefix.
pub const API_PREFIX: &str = "/api/v1";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Run admission and worker.
    pub orchestrator: Orchestrator,
    /// Daily trigger, read for status only.
    pub scheduler: Arc<DailyScheduler>,
    /// Stored images.
    pub images: ImageStore,
    /// Current prompt.
    pub prompt: PromptFile,
    /// Prompt log.
    pub history: Arc<PromptHistory>,
}

impl AppState {
    fn events(&self) -> &Arc<BroadcastChannel> {
        self.orchestrator.events()
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/prompts/current",
            get(routes::current_prompt).put(routes::update_prompt),
        )
        .route("/prompts/history", get(routes::prompt_history))
        .route("/generate", post(routes::generate))
        .route("/display/{filename}", post(routes::display_image))
        .route("/status", get(routes::status))
        .route("/scheduler", get(routes::scheduler_status))
        .route("/images", get(routes::list_images))
        .route("/images/{filename}", get(routes::serve_image))
        .route("/health", get(routes::health))
        .route("/ws", get(ws::upgrade));

    Router::new().nest(API_PREFIX, api).with_state(state)
}

/// Running HTTP server.
pub struct StudioServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl StudioServer {
    /// Bind `bind_addr` (port `0` picks a free port) and serve in a
    /// background task.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot bind.
    pub async fn start(state: AppState, bind_addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| StudioError::Config(format!("cannot bind {bind_addr}: {e}")))?;
        let addr = listener.local_addr()?;

        let shutdown = CancellationToken::new();
        let app = router(state);
        let signal = shutdown.clone().cancelled_owned();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(signal)
                .await
            {
                tracing::error!("HTTP server error: {e}");
            }
        });

        info!("e-paper studio listening on http://{addr}{API_PREFIX}");
        Ok(Self {
            addr,
            shutdown,
            handle,
        })
    }

    /// Address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL for the API, e.g. `http://127.0.0.1:8000/api/v1`.
    pub fn api_url(&self) -> String {
        format!("http://{}{API_PREFIX}", self.addr)
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!("HTTP server task ended abnormally: {e}");
        }
    }
}
