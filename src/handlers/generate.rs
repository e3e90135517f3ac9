// src/handlers/generate.rs
//! Submission, operation status/reset and generated video streaming

use axum::{
    extract::{Extension, Path},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use super::api_error;
use crate::generation::VideoProvider;
use crate::operation::TransitionError;
use crate::studio::{self, SubmitError};
use crate::veo_client::VeoClient;
use crate::AppState;

pub fn generate_routes() -> Router {
    Router::new()
        .route("/api/generate", post(generate_video))
        .route("/api/operation", get(get_operation))
        .route("/api/operation/reset", post(reset_operation))
        .route("/videos/:video_id", get(stream_video))
}

/// POST /api/generate - validate the form and start generating in the background
pub async fn generate_video(Extension(state): Extension<Arc<AppState>>) -> Response {
    let base_url = state.config.base_url.clone();
    let make_provider = move |api_key: String| -> Arc<dyn VideoProvider> {
        Arc::new(VeoClient::new(api_key).with_base_url(base_url))
    };

    match studio::submit(state, make_provider).await {
        Ok(submission) => (
            StatusCode::ACCEPTED,
            Json(json!({ "success": true, "operation": submission.snapshot })),
        )
            .into_response(),
        Err(e) => {
            let status = match e {
                SubmitError::KeyRequired => StatusCode::FORBIDDEN,
                SubmitError::Validation(_) => StatusCode::BAD_REQUEST,
                SubmitError::Busy => StatusCode::CONFLICT,
            };
            tracing::warn!("Generation request rejected ({}): {}", status, e);
            api_error(status, e).into_response()
        }
    }
}

/// GET /api/operation
pub async fn get_operation(Extension(state): Extension<Arc<AppState>>) -> Response {
    let snapshot = state.operation.read().await.snapshot();
    Json(json!({ "success": true, "operation": snapshot })).into_response()
}

/// POST /api/operation/reset - back to idle; the previous video is released
pub async fn reset_operation(Extension(state): Extension<Arc<AppState>>) -> Response {
    let mut operation = state.operation.write().await;
    match operation.reset() {
        Ok(previous) => {
            if let Some(video) = previous {
                tracing::info!("Discarding video {}", video.id());
            }
            Json(json!({ "success": true, "operation": operation.snapshot() })).into_response()
        }
        Err(e @ TransitionError::Busy) => api_error(StatusCode::CONFLICT, e).into_response(),
        Err(e) => api_error(StatusCode::BAD_REQUEST, e).into_response(),
    }
}

/// GET /videos/:video_id - playable bytes of a generated video
pub async fn stream_video(
    Path(video_id): Path<String>,
    Extension(state): Extension<Arc<AppState>>,
) -> Response {
    let Ok(id) = Uuid::parse_str(&video_id) else {
        return api_error(StatusCode::BAD_REQUEST, "Invalid video id").into_response();
    };

    match state.videos.get(&id) {
        Some(video) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, video.content_type.clone()),
                (header::CACHE_CONTROL, "no-store".to_string()),
            ],
            video.bytes.as_ref().clone(),
        )
            .into_response(),
        None => api_error(StatusCode::NOT_FOUND, "Video not found or already released").into_response(),
    }
}
