// src/veo_client.rs
// Veo (Gemini API) long-running video generation client
// Submit: POST {base}/models/{model}:predictLongRunning
// Poll:   GET  {base}/{operation name}
// Result: GET  {video uri}&key=...

use async_trait::async_trait;
use base64::prelude::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_BASE_URL;
use crate::error::{GenerationError, UNKNOWN_PROVIDER_ERROR};
use crate::form::AspectRatio;
use crate::generation::{FetchedVideo, VideoProvider};
use crate::request::{ReferenceRole, VideoGenerationRequest};

const BODY_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct VeoClient {
    client: Client,
    api_key: String,
    base_url: String,
}

// ============================================================================
// API REQUEST/RESPONSE STRUCTURES
// ============================================================================

#[derive(Debug, Serialize)]
pub struct PredictLongRunningRequest {
    pub instances: Vec<VideoInstance>,
    pub parameters: VideoParameters,
}

#[derive(Debug, Serialize)]
pub struct VideoInstance {
    pub prompt: String,
    #[serde(rename = "referenceImages", skip_serializing_if = "Vec::is_empty")]
    pub reference_images: Vec<WireReferenceImage>,
}

#[derive(Debug, Serialize)]
pub struct WireReferenceImage {
    pub image: WireImage,
    #[serde(rename = "referenceType")]
    pub reference_type: ReferenceRole,
}

#[derive(Debug, Serialize)]
pub struct WireImage {
    #[serde(rename = "bytesBase64Encoded")]
    pub bytes_base64_encoded: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

#[derive(Debug, Serialize)]
pub struct VideoParameters {
    #[serde(rename = "aspectRatio")]
    pub aspect_ratio: AspectRatio,
    pub resolution: String,
    #[serde(rename = "sampleCount")]
    pub sample_count: u32,
}

impl From<&VideoGenerationRequest> for PredictLongRunningRequest {
    fn from(request: &VideoGenerationRequest) -> Self {
        let reference_images = request
            .reference_images
            .iter()
            .map(|reference| WireReferenceImage {
                image: WireImage {
                    bytes_base64_encoded: BASE64_STANDARD.encode(&reference.bytes),
                    mime_type: reference.mime_type.clone(),
                },
                reference_type: reference.role,
            })
            .collect();

        Self {
            instances: vec![VideoInstance {
                prompt: request.prompt.clone(),
                reference_images,
            }],
            parameters: VideoParameters {
                aspect_ratio: request.aspect_ratio,
                resolution: request.resolution.to_string(),
                sample_count: request.number_of_videos,
            },
        }
    }
}

/// Long-running operation handle as returned by submit and poll
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoOperation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<VideoOperationResponse>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// The REST API nests samples under `generateVideoResponse.generatedSamples`,
/// SDK-shaped payloads use `generatedVideos`; both are accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoOperationResponse {
    #[serde(rename = "generateVideoResponse", default, skip_serializing_if = "Option::is_none")]
    pub generate_video_response: Option<GeneratedSamples>,
    #[serde(rename = "generatedVideos", default, skip_serializing_if = "Option::is_none")]
    pub generated_videos: Option<Vec<GeneratedVideo>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedSamples {
    #[serde(rename = "generatedSamples", default)]
    pub generated_samples: Vec<GeneratedVideo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedVideo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl VideoOperation {
    /// URI of the first generated video, if any
    pub fn video_uri(&self) -> Option<&str> {
        let response = self.response.as_ref()?;
        let first = match &response.generated_videos {
            Some(videos) => videos.first(),
            None => response
                .generate_video_response
                .as_ref()
                .and_then(|r| r.generated_samples.first()),
        }?;
        first
            .video
            .as_ref()
            .and_then(|v| v.uri.as_deref())
            .filter(|uri| !uri.is_empty())
    }

    /// Terminal check: the provider's error wins, then the result URI must exist
    pub fn result_uri(&self) -> Result<&str, GenerationError> {
        if let Some(error) = &self.error {
            let message = error
                .message
                .as_deref()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(UNKNOWN_PROVIDER_ERROR);
            return Err(GenerationError::Provider(message.to_string()));
        }
        self.video_uri().ok_or(GenerationError::MissingResult)
    }
}

// ============================================================================
// IMPLEMENTATION
// ============================================================================

impl VeoClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn read_operation(response: reqwest::Response, context: &str) -> Result<VideoOperation, GenerationError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(GenerationError::Transport(format!("Veo {} error ({}): {}", context, status, body)));
        }

        serde_json::from_str::<VideoOperation>(&body).map_err(|e| {
            tracing::error!("Failed to parse Veo {} response: {}", context, e);
            tracing::debug!("Response body: {}", body_preview(&body));
            GenerationError::Transport(format!("error decoding Veo {} response: {}", context, e))
        })
    }
}

/// Leading slice of a response body for logs, cut on a char boundary
fn body_preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

#[async_trait]
impl VideoProvider for VeoClient {
    async fn submit(&self, request: &VideoGenerationRequest) -> Result<VideoOperation, GenerationError> {
        let url = format!("{}/models/{}:predictLongRunning", self.base_url, request.model);
        let body = PredictLongRunningRequest::from(request);

        tracing::info!(
            model = %request.model,
            references = request.reference_images.len(),
            aspect_ratio = %request.aspect_ratio,
            "Submitting Veo generation request"
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let operation = Self::read_operation(response, "submit").await?;
        tracing::info!("Veo accepted request, operation: {}", operation.name);
        Ok(operation)
    }

    async fn poll(&self, operation: &VideoOperation) -> Result<VideoOperation, GenerationError> {
        let url = format!("{}/{}", self.base_url, operation.name.trim_start_matches('/'));

        let response = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        Self::read_operation(response, "poll").await
    }

    async fn fetch_video(&self, uri: &str) -> Result<FetchedVideo, GenerationError> {
        let response = self
            .client
            .get(uri)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| GenerationError::Download(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GenerationError::Download(format!("({}) {}", status, error_text)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|ct| ct.starts_with("video/"))
            .unwrap_or("video/mp4")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GenerationError::Download(e.to_string()))?;

        tracing::info!("Downloaded generated video ({} bytes, {})", bytes.len(), content_type);
        Ok(FetchedVideo {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{ReferenceImage, RESOLUTION};
    use axum::{
        extract::{Path, Query},
        http::{header, StatusCode},
        response::IntoResponse,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn sample_request() -> VideoGenerationRequest {
        VideoGenerationRequest {
            model: "veo-test".to_string(),
            prompt: "make a video".to_string(),
            reference_images: vec![
                ReferenceImage { bytes: b"face".to_vec(), mime_type: "image/png".to_string(), role: ReferenceRole::Asset },
                ReferenceImage { bytes: b"bag".to_vec(), mime_type: "image/jpeg".to_string(), role: ReferenceRole::Asset },
            ],
            number_of_videos: 1,
            resolution: RESOLUTION,
            aspect_ratio: AspectRatio::Portrait,
        }
    }

    #[test]
    fn test_submit_body_shape() {
        let body = serde_json::to_value(PredictLongRunningRequest::from(&sample_request())).unwrap();
        assert_eq!(
            body,
            json!({
                "instances": [{
                    "prompt": "make a video",
                    "referenceImages": [
                        {"image": {"bytesBase64Encoded": "ZmFjZQ==", "mimeType": "image/png"}, "referenceType": "asset"},
                        {"image": {"bytesBase64Encoded": "YmFn", "mimeType": "image/jpeg"}, "referenceType": "asset"}
                    ]
                }],
                "parameters": {"aspectRatio": "9:16", "resolution": "720p", "sampleCount": 1}
            })
        );
    }

    #[test]
    fn test_parses_rest_and_sdk_result_shapes() {
        let rest: VideoOperation = serde_json::from_value(json!({
            "name": "models/veo/operations/abc",
            "done": true,
            "response": {
                "@type": "type.googleapis.com/google.ai.generativelanguage.v1beta.PredictLongRunningResponse",
                "generateVideoResponse": {"generatedSamples": [{"video": {"uri": "https://files/v1?alt=media"}}]}
            }
        }))
        .unwrap();
        assert_eq!(rest.result_uri(), Ok("https://files/v1?alt=media"));

        let sdk: VideoOperation = serde_json::from_value(json!({
            "name": "op", "done": true,
            "response": {"generatedVideos": [{"video": {"uri": "https://files/v2"}}]}
        }))
        .unwrap();
        assert_eq!(sdk.video_uri(), Some("https://files/v2"));

        let pending: VideoOperation = serde_json::from_value(json!({"name": "op"})).unwrap();
        assert!(!pending.done);
    }

    #[test]
    fn test_terminal_errors() {
        let failed = VideoOperation {
            name: "op".to_string(),
            done: true,
            error: Some(OperationError { code: Some(3), message: Some("Prompt blocked".to_string()) }),
            response: None,
        };
        assert_eq!(failed.result_uri(), Err(GenerationError::Provider("Prompt blocked".to_string())));

        let silent = VideoOperation {
            error: Some(OperationError::default()),
            ..failed.clone()
        };
        assert_eq!(silent.result_uri(), Err(GenerationError::Provider(UNKNOWN_PROVIDER_ERROR.to_string())));

        let empty = VideoOperation { name: "op".to_string(), done: true, ..Default::default() };
        assert_eq!(empty.result_uri(), Err(GenerationError::MissingResult));
    }

    async fn spawn_fake_veo(seen_keys: Arc<Mutex<Vec<String>>>) -> String {
        let submit_keys = seen_keys.clone();
        let poll_keys = seen_keys.clone();
        let file_keys = seen_keys;

        let app = Router::new()
            .route(
                "/v1beta/models/:model_action",
                post(move |Path(model_action): Path<String>, Query(q): Query<HashMap<String, String>>, Json(body): Json<Value>| {
                    let keys = submit_keys.clone();
                    async move {
                        keys.lock().unwrap().push(q.get("key").cloned().unwrap_or_default());
                        assert_eq!(model_action, "veo-test:predictLongRunning");
                        assert_eq!(body["parameters"]["sampleCount"], 1);
                        Json(json!({"name": "operations/op-1"}))
                    }
                }),
            )
            .route(
                "/v1beta/operations/:id",
                get(move |Path(id): Path<String>, Query(q): Query<HashMap<String, String>>| {
                    let keys = poll_keys.clone();
                    async move {
                        keys.lock().unwrap().push(q.get("key").cloned().unwrap_or_default());
                        if id == "garbled" {
                            let mut page = "x".repeat(BODY_PREVIEW_CHARS - 1);
                            page.push_str("ệ lỗi máy chủ");
                            return page.into_response();
                        }
                        if id == "missing" {
                            return (
                                StatusCode::NOT_FOUND,
                                Json(json!({"error": {"code": 404, "message": "Requested entity was not found."}})),
                            )
                                .into_response();
                        }
                        Json(json!({"name": "operations/op-1", "done": true})).into_response()
                    }
                }),
            )
            .route(
                "/files/:id",
                get(move |Query(q): Query<HashMap<String, String>>| {
                    let keys = file_keys.clone();
                    async move {
                        assert_eq!(q.get("alt").map(String::as_str), Some("media"));
                        keys.lock().unwrap().push(q.get("key").cloned().unwrap_or_default());
                        ([(header::CONTENT_TYPE, "video/mp4")], vec![9u8, 8, 7]).into_response()
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_http_round_trip_appends_key() {
        let seen_keys = Arc::new(Mutex::new(Vec::new()));
        let server = spawn_fake_veo(seen_keys.clone()).await;
        let client = VeoClient::new("secret".to_string()).with_base_url(format!("{}/v1beta/", server));

        let operation = client.submit(&sample_request()).await.unwrap();
        assert_eq!(operation.name, "operations/op-1");
        assert!(!operation.done);

        let refreshed = client.poll(&operation).await.unwrap();
        assert!(refreshed.done);

        let video = client.fetch_video(&format!("{}/files/v1?alt=media", server)).await.unwrap();
        assert_eq!(video.bytes, vec![9, 8, 7]);
        assert_eq!(video.content_type, "video/mp4");

        assert_eq!(*seen_keys.lock().unwrap(), vec!["secret", "secret", "secret"]);
    }

    #[tokio::test]
    async fn test_http_error_keeps_provider_message() {
        let server = spawn_fake_veo(Arc::new(Mutex::new(Vec::new()))).await;
        let client = VeoClient::new("secret".to_string()).with_base_url(format!("{}/v1beta", server));
        let stale = VideoOperation { name: "operations/missing".to_string(), ..Default::default() };

        let err = client.poll(&stale).await.unwrap_err();
        assert!(matches!(err, GenerationError::Transport(ref m) if m.contains("404")));
        assert_eq!(err.classify(), GenerationError::AuthRequired);

        let download = client.fetch_video(&format!("{}/nowhere", server)).await.unwrap_err();
        assert!(matches!(download, GenerationError::Download(_)));
    }

    #[test]
    fn test_body_preview_respects_char_boundaries() {
        let mut body = "a".repeat(BODY_PREVIEW_CHARS - 1);
        body.push('ệ');
        body.push_str("tail");

        let preview = body_preview(&body);
        assert_eq!(preview.chars().count(), BODY_PREVIEW_CHARS);
        assert!(preview.ends_with('ệ'));
        assert_eq!(body_preview("short"), "short");
    }

    #[tokio::test]
    async fn test_unparseable_multibyte_body_is_a_transport_error() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let server = spawn_fake_veo(Arc::new(Mutex::new(Vec::new()))).await;
        let client = VeoClient::new("secret".to_string()).with_base_url(format!("{}/v1beta", server));
        let operation = VideoOperation { name: "operations/garbled".to_string(), ..Default::default() };

        let err = client.poll(&operation).await.unwrap_err();
        assert!(matches!(err, GenerationError::Transport(ref m) if m.contains("error decoding Veo")));
    }
}
