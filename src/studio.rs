// src/studio.rs
//! Top-level submission handling: form → request → generation client → operation state.

use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::credentials::KeySelector;
use crate::error::GenerationError;
use crate::generation::{GenerationClient, ProgressSink, VideoProvider};
use crate::operation::OperationSnapshot;
use crate::request::GenerationParams;
use crate::video_store::VideoHandle;
use crate::AppState;

pub const GENERATION_ABORTED: &str = "Generation task aborted";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubmitError {
    #[error("An API key from a billing-enabled project must be selected first")]
    KeyRequired,
    #[error("{0}")]
    Validation(GenerationError),
    #[error("A video is already being generated")]
    Busy,
}

/// An accepted submission; `task` finishes once the operation is done or failed
pub struct Submission {
    pub snapshot: OperationSnapshot,
    pub task: JoinHandle<()>,
}

/// Validate the form and start a generation in the background.
///
/// `make_provider` receives the currently selected key, so every submission uses
/// the latest selection.
pub async fn submit<F>(state: Arc<AppState>, make_provider: F) -> Result<Submission, SubmitError>
where
    F: FnOnce(String) -> Arc<dyn VideoProvider>,
{
    let api_key = state
        .key_selector
        .current_key()
        .await
        .ok_or(SubmitError::KeyRequired)?;

    let params = {
        let form = state.form.read().await;
        GenerationParams::from_form(&form).map_err(SubmitError::Validation)?
    };

    let (operation_id, snapshot) = {
        let mut operation = state.operation.write().await;
        let id = operation.begin().map_err(|_| SubmitError::Busy)?;
        (id, operation.snapshot())
    };

    tracing::info!(
        operation_id = %operation_id,
        subjects = params.subject_images.len(),
        has_product = params.product_image.is_some(),
        aspect_ratio = %params.aspect_ratio,
        "Submitting video generation"
    );

    let client = GenerationClient::new(make_provider(api_key), state.videos.clone(), &state.config);
    let task = tokio::spawn(run_generation(state, client, params, operation_id));

    Ok(Submission { snapshot, task })
}

async fn run_generation(state: Arc<AppState>, client: GenerationClient, params: GenerationParams, operation_id: String) {
    let (sink, mut updates) = ProgressSink::channel();

    let forwarder = {
        let state = state.clone();
        let operation_id = operation_id.clone();
        tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                state.operation.write().await.record_progress(&operation_id, update.message);
            }
        })
    };

    // Own task so a panic surfaces as a JoinError instead of skipping `settle`.
    // The sink moves in and is dropped when the task ends either way.
    let generation = tokio::spawn(async move { client.generate(&params, &sink).await });
    let result = match generation.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("❌ Generation task for {} aborted: {}", operation_id, e);
            Err(GenerationError::Transport(format!("{}: {}", GENERATION_ABORTED, e)))
        }
    };

    // Let queued progress land before the terminal state
    if let Err(e) = forwarder.await {
        tracing::warn!("Progress forwarder for {} ended abnormally: {}", operation_id, e);
    }

    settle(&state, &operation_id, result).await;
}

async fn settle(state: &AppState, operation_id: &str, result: Result<VideoHandle, GenerationError>) {
    match result {
        Ok(video) => {
            if let Err(e) = state.operation.write().await.complete(operation_id, video) {
                tracing::warn!("Discarding result of operation {}: {}", operation_id, e);
            }
        }
        Err(err) => {
            let auth_required = err.is_auth_required();
            if let Err(e) = state.operation.write().await.fail(operation_id, err.to_string(), auth_required) {
                tracing::warn!("Could not record failure of operation {}: {}", operation_id, e);
            }
            if auth_required {
                if let Err(e) = state.key_selector.request_key_selection().await {
                    tracing::error!("Failed to open key selection: {}", e);
                }
            }
        }
    }
}
