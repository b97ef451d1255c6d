use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::{API_PREFIX, AppState};
use crate::broadcast::StudioEvent;
use crate::error::StudioError;
use crate::storage::normalize_prompt;
use crate::task::RunKind;

impl StudioError {
    /// HTTP status for this error when it reaches a handler.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AccessDenied(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::Validation(msg) | Self::Conflict(msg) => msg.clone(),
            Self::NotFound(_) => "Image not found".to_owned(),
            Self::AccessDenied(_) => "Access denied".to_owned(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for StudioError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        } else {
            info!("request rejected ({status}): {self}");
        }
        (status, Json(json!({ "detail": self.detail() }))).into_response()
    }
}

type ApiResult = Result<Json<serde_json::Value>, StudioError>;

#[derive(Debug, Deserialize)]
pub(super) struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PromptBody {
    prompt: String,
}

pub(super) async fn current_prompt(State(state): State<AppState>) -> ApiResult {
    let prompt = state.prompt.read()?;
    Ok(Json(json!({ "prompt": prompt })))
}

pub(super) async fn update_prompt(
    State(state): State<AppState>,
    Json(body): Json<PromptBody>,
) -> ApiResult {
    let prompt = normalize_prompt(&body.prompt)?;
    state.prompt.write(&prompt)?;
    if let Err(e) = state.history.append(&prompt) {
        warn!("prompt history not updated: {e}");
    }
    info!("prompt updated ({} chars)", prompt.chars().count());

    state
        .events()
        .publish(&StudioEvent::PromptUpdate { prompt });
    Ok(Json(json!({
        "success": true,
        "message": "Prompt updated successfully",
    })))
}

pub(super) async fn prompt_history(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult {
    let prompts = state.history.last(query.limit.unwrap_or(3))?;
    Ok(Json(json!({ "prompts": prompts })))
}

pub(super) async fn generate(State(state): State<AppState>) -> ApiResult {
    state.orchestrator.request_run(RunKind::Generate)?;
    Ok(Json(json!({
        "status": "started",
        "message": "Image generation started",
    })))
}

pub(super) async fn display_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult {
    let path = state.images.resolve(&filename)?;
    state
        .orchestrator
        .request_run(RunKind::DisplayExisting(path))?;
    Ok(Json(json!({
        "status": "started",
        "message": format!("Displaying {filename}"),
    })))
}

pub(super) async fn status(State(state): State<AppState>) -> ApiResult {
    let snapshot = state.orchestrator.state().snapshot();
    Ok(Json(json!(snapshot)))
}

pub(super) async fn scheduler_status(State(state): State<AppState>) -> ApiResult {
    Ok(Json(json!(state.scheduler.status())))
}

pub(super) async fn list_images(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult {
    let images = state.images.list(query.limit.unwrap_or(50))?;
    let images: Vec<_> = images
        .into_iter()
        .map(|info| {
            json!({
                "url": format!("{API_PREFIX}/images/{}", info.filename),
                "filename": info.filename,
                "path": info.path,
                "created_at": info.created_at,
                "size_bytes": info.size_bytes,
            })
        })
        .collect();
    Ok(Json(json!({ "total": images.len(), "images": images })))
}

pub(super) async fn serve_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, StudioError> {
    let path = state.images.resolve(&filename)?;
    let bytes = tokio::fs::read(&path).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], bytes).into_response())
}

pub(super) async fn health() -> ApiResult {
    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}
