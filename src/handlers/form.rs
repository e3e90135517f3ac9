// src/handlers/form.rs
//! Form endpoints: subject/product uploads, prompts and aspect ratio

use axum::{
    extract::{multipart::Multipart, DefaultBodyLimit, Extension, Path},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{api_error, ApiError};
use crate::form::{AspectRatio, SlotIndex};
use crate::intake::{self, EncodedImage, ImageSource};
use crate::AppState;

#[derive(Deserialize)]
pub struct PromptsRequest {
    pub background: Option<String>,
    pub action: Option<String>,
    pub speech: Option<String>,
}

#[derive(Deserialize)]
pub struct AspectRatioRequest {
    pub aspect_ratio: String,
}

pub fn form_routes(max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/form", get(get_form))
        .route("/api/form/subjects/:index", post(upload_subject).delete(clear_subject))
        .route("/api/form/product", post(upload_product).delete(clear_product))
        .route("/api/form/prompts", put(set_prompts))
        .route("/api/form/aspect-ratio", put(set_aspect_ratio))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

fn slot_from_path(index: usize) -> Result<SlotIndex, ApiError> {
    SlotIndex::try_from(index).map_err(|e| api_error(StatusCode::BAD_REQUEST, e))
}

/// Pull the `file` part out of a multipart body and run it through intake.
/// `Ok(None)` means the part was not an image.
async fn read_image_part(mut multipart: Multipart) -> Result<Option<EncodedImage>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Failed to read upload: {}", e)))?;

        let source = ImageSource::Bytes {
            bytes: bytes.to_vec(),
            content_type,
            file_name,
        };
        return intake::read_as_data_url(source).await.map_err(|e| {
            tracing::error!("Image intake failed: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read image")
        });
    }

    Err(api_error(StatusCode::BAD_REQUEST, "Missing multipart field 'file'"))
}

/// GET /api/form
pub async fn get_form(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    let form = state.form.read().await;
    Json(json!({ "success": true, "form": form.snapshot() }))
}

/// POST /api/form/subjects/:index - non-image uploads leave the slot untouched
pub async fn upload_subject(
    Path(index): Path<usize>,
    Extension(state): Extension<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let slot = slot_from_path(index)?;
    let image = read_image_part(multipart).await?;

    let mut form = state.form.write().await;
    let accepted = image.is_some();
    if let Some(image) = image {
        form.set_subject(slot, image);
        tracing::info!("📷 Subject slot {} updated", slot.get());
    }

    Ok(Json(json!({ "success": true, "accepted": accepted, "form": form.snapshot() })))
}

/// DELETE /api/form/subjects/:index
pub async fn clear_subject(
    Path(index): Path<usize>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let slot = slot_from_path(index)?;
    let mut form = state.form.write().await;
    form.clear_subject(slot);
    Ok(Json(json!({ "success": true, "form": form.snapshot() })))
}

/// POST /api/form/product
pub async fn upload_product(
    Extension(state): Extension<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let image = read_image_part(multipart).await?;

    let mut form = state.form.write().await;
    let accepted = image.is_some();
    if let Some(image) = image {
        form.set_product(image);
        tracing::info!("🛍️ Product image updated");
    }

    Ok(Json(json!({ "success": true, "accepted": accepted, "form": form.snapshot() })))
}

/// DELETE /api/form/product
pub async fn clear_product(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    let mut form = state.form.write().await;
    form.clear_product();
    Json(json!({ "success": true, "form": form.snapshot() }))
}

/// PUT /api/form/prompts - only the fields present are replaced
pub async fn set_prompts(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<PromptsRequest>,
) -> Json<Value> {
    let mut form = state.form.write().await;
    if let Some(background) = request.background {
        form.background_prompt = background;
    }
    if let Some(action) = request.action {
        form.action_prompt = action;
    }
    if let Some(speech) = request.speech {
        form.speech_prompt = speech;
    }
    Json(json!({ "success": true, "form": form.snapshot() }))
}

/// PUT /api/form/aspect-ratio
pub async fn set_aspect_ratio(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<AspectRatioRequest>,
) -> Result<Json<Value>, ApiError> {
    let aspect_ratio: AspectRatio = request
        .aspect_ratio
        .parse::<AspectRatio>()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;

    let mut form = state.form.write().await;
    form.aspect_ratio = aspect_ratio;
    Ok(Json(json!({ "success": true, "form": form.snapshot() })))
}
