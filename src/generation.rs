// src/generation.rs
//! Generation client: submit a request, poll the long-running operation at a
//! fixed interval, then download the result into the local video store.
//!
//! Lifecycle: submitting → polling → succeeded | failed. Polling has no overall
//! deadline; it ends on a terminal operation or when consecutive poll failures
//! exceed the configured budget.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::{Config, DEFAULT_MAX_POLL_FAILURES, DEFAULT_POLL_INTERVAL_SECS};
use crate::error::GenerationError;
use crate::request::{GenerationParams, PromptLocale, VideoGenerationRequest};
use crate::veo_client::VideoOperation;
use crate::video_store::{VideoHandle, VideoStore};

/// Bytes downloaded from the provider's result URI
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedVideo {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Seam to the external video generation service
#[async_trait]
pub trait VideoProvider: Send + Sync {
    async fn submit(&self, request: &VideoGenerationRequest) -> Result<VideoOperation, GenerationError>;

    async fn poll(&self, operation: &VideoOperation) -> Result<VideoOperation, GenerationError>;

    /// Download the result; the access credential is added by the provider
    async fn fetch_video(&self, uri: &str) -> Result<FetchedVideo, GenerationError>;
}

/// Progress message delivered to whoever is watching the generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(message: String) -> Self {
        Self {
            timestamp: Utc::now(),
            message,
        }
    }
}

/// Fire-and-forget progress channel. Sending never blocks, and a receiver that
/// went away is not an error.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    sender: Option<mpsc::UnboundedSender<ProgressUpdate>>,
}

impl ProgressSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { sender: Some(tx) }, rx)
    }

    /// A sink that discards everything
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!("📤 Progress: {}", message);
        if let Some(sender) = &self.sender {
            if sender.send(ProgressUpdate::new(message)).is_err() {
                tracing::trace!("Progress receiver dropped, update discarded");
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Polling gives up once this many consecutive queries have failed and one more fails
    pub max_consecutive_failures: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_consecutive_failures: DEFAULT_MAX_POLL_FAILURES,
        }
    }
}

impl PollPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.poll_interval,
            max_consecutive_failures: config.max_poll_failures,
        }
    }
}

/// Polling-phase state: the latest operation handle and the failure streak
#[derive(Debug, Clone, PartialEq)]
pub struct PollState {
    operation: VideoOperation,
    consecutive_failures: u32,
}

impl PollState {
    pub fn new(operation: VideoOperation) -> Self {
        Self {
            operation,
            consecutive_failures: 0,
        }
    }

    pub fn operation(&self) -> &VideoOperation {
        &self.operation
    }

    pub fn is_done(&self) -> bool {
        self.operation.done
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn record_success(&mut self, refreshed: VideoOperation) {
        self.operation = refreshed;
        self.consecutive_failures = 0;
    }

    /// Count a failed poll. Returns the error back once the budget is exceeded.
    pub fn record_failure(&mut self, error: GenerationError, policy: &PollPolicy) -> Result<(), GenerationError> {
        self.consecutive_failures += 1;
        if self.consecutive_failures > policy.max_consecutive_failures {
            Err(error)
        } else {
            Ok(())
        }
    }

    pub fn into_operation(self) -> VideoOperation {
        self.operation
    }
}

pub struct GenerationClient {
    provider: Arc<dyn VideoProvider>,
    videos: VideoStore,
    policy: PollPolicy,
    model: String,
    locale: PromptLocale,
}

impl GenerationClient {
    pub fn new(provider: Arc<dyn VideoProvider>, videos: VideoStore, config: &Config) -> Self {
        Self {
            provider,
            videos,
            policy: PollPolicy::from_config(config),
            model: config.model.clone(),
            locale: config.prompt_locale,
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Run one generation to completion. Entity-not-found failures come back as
    /// [`GenerationError::AuthRequired`].
    pub async fn generate(&self, params: &GenerationParams, progress: &ProgressSink) -> Result<VideoHandle, GenerationError> {
        self.run(params, progress).await.map_err(|e| {
            tracing::error!("❌ Video generation failed: {}", e);
            e.classify()
        })
    }

    async fn run(&self, params: &GenerationParams, progress: &ProgressSink) -> Result<VideoHandle, GenerationError> {
        let request = VideoGenerationRequest::build(params, &self.model, self.locale)?;
        let text = self.locale.progress();

        progress.emit(text.request_initiated);
        let operation = self.provider.submit(&request).await?;
        progress.emit(text.request_accepted);

        let operation = self.poll_until_done(operation, progress).await?;

        let uri = operation.result_uri()?;
        progress.emit(text.downloading);
        let video = self.provider.fetch_video(uri).await?;

        let handle = self.videos.insert(video.bytes, video.content_type);
        tracing::info!("✅ Generated video stored at {} ({} bytes)", handle.url(), handle.size_bytes());
        Ok(handle)
    }

    async fn poll_until_done(&self, operation: VideoOperation, progress: &ProgressSink) -> Result<VideoOperation, GenerationError> {
        let text = self.locale.progress();
        let mut state = PollState::new(operation);
        let mut attempt: u64 = 0;

        while !state.is_done() {
            tokio::time::sleep(self.policy.interval).await;
            attempt += 1;

            match self.provider.poll(state.operation()).await {
                Ok(refreshed) => {
                    tracing::debug!(
                        "Poll #{} for {}: done={}",
                        attempt,
                        refreshed.name,
                        refreshed.done
                    );
                    state.record_success(refreshed);
                    progress.emit(text.still_generating);
                }
                Err(e) => {
                    tracing::warn!("Polling error, retrying... (attempt {}): {}", attempt, e);
                    state.record_failure(e.clone(), &self.policy)?;
                    progress.emit(format!(
                        "{} ({}/{}): {}",
                        text.poll_retry,
                        state.consecutive_failures(),
                        self.policy.max_consecutive_failures,
                        e
                    ));
                }
            }
        }

        Ok(state.into_operation())
    }
}
