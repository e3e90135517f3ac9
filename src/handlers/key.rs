// src/handlers/key.rs
//! API key selection endpoints. Without a selected key every submission is refused.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{api_error, ApiError};
use crate::credentials::KeySelector;
use crate::AppState;

#[derive(Deserialize)]
pub struct SelectKeyRequest {
    pub api_key: String,
}

pub fn key_routes() -> Router {
    Router::new().route("/api/key", get(key_status).post(select_key))
}

/// GET /api/key
pub async fn key_status(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "success": true,
        "has_selected_key": state.key_selector.has_selected_key().await,
        "selection_requested": state.key_selector.selection_requested().await,
        "billing_docs": "https://ai.google.dev/gemini-api/docs/billing",
    }))
}

/// POST /api/key
pub async fn select_key(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<SelectKeyRequest>,
) -> Result<Json<Value>, ApiError> {
    state
        .key_selector
        .select_key(request.api_key)
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;

    Ok(Json(json!({ "success": true, "has_selected_key": true })))
}
