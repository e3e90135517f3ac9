// src/operation.rs
//! UI-facing operation state: idle → processing → done | error, with an explicit
//! reset back to idle. Only one operation is processing at a time.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::request::{ProgressText, PromptLocale};
use crate::video_store::VideoHandle;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionError {
    #[error("A video is already being generated")]
    Busy,
    #[error("No generation is in progress")]
    NotProcessing,
    #[error("Operation {0} is no longer current")]
    StaleOperation(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Idle,
    Processing,
    Done,
    Error,
}

#[derive(Debug)]
enum Phase {
    Idle,
    Processing,
    Done(VideoHandle),
    Error { message: String, auth_required: bool },
}

/// Serializable view returned by the HTTP surface
#[derive(Debug, Clone, Serialize)]
pub struct OperationSnapshot {
    pub id: String,
    pub status: OperationStatus,
    pub progress_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub auth_required: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct OperationTracker {
    id: String,
    phase: Phase,
    progress_message: String,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    text: &'static ProgressText,
}

impl Default for OperationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::with_locale(PromptLocale::default())
    }

    pub fn with_locale(locale: PromptLocale) -> Self {
        Self {
            id: String::new(),
            phase: Phase::Idle,
            progress_message: String::new(),
            started_at: None,
            finished_at: None,
            text: locale.progress(),
        }
    }

    pub fn status(&self) -> OperationStatus {
        match self.phase {
            Phase::Idle => OperationStatus::Idle,
            Phase::Processing => OperationStatus::Processing,
            Phase::Done(_) => OperationStatus::Done,
            Phase::Error { .. } => OperationStatus::Error,
        }
    }

    pub fn is_processing(&self) -> bool {
        matches!(self.phase, Phase::Processing)
    }

    pub fn current_id(&self) -> &str {
        &self.id
    }

    pub fn video(&self) -> Option<&VideoHandle> {
        match &self.phase {
            Phase::Done(handle) => Some(handle),
            _ => None,
        }
    }

    /// Start a new operation. Allowed from idle, done and error; a previous
    /// result is released. Returns the new operation id.
    pub fn begin(&mut self) -> Result<String, TransitionError> {
        if self.is_processing() {
            return Err(TransitionError::Busy);
        }

        self.id = Uuid::new_v4().to_string();
        self.phase = Phase::Processing;
        self.progress_message = self.text.starting.to_string();
        self.started_at = Some(Utc::now());
        self.finished_at = None;
        tracing::info!("🎬 Operation {} started", self.id);
        Ok(self.id.clone())
    }

    /// Update the progress message of the running operation. Updates for any
    /// other operation id are ignored; returns whether the update was applied.
    pub fn record_progress(&mut self, id: &str, message: impl Into<String>) -> bool {
        if !self.is_processing() || self.id != id {
            return false;
        }
        self.progress_message = message.into();
        true
    }

    pub fn complete(&mut self, id: &str, video: VideoHandle) -> Result<(), TransitionError> {
        self.ensure_running(id)?;
        tracing::info!("✅ Operation {} done: {}", id, video.url());
        self.phase = Phase::Done(video);
        self.progress_message = self.text.completed.to_string();
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn fail(&mut self, id: &str, message: impl Into<String>, auth_required: bool) -> Result<(), TransitionError> {
        self.ensure_running(id)?;
        let message = message.into();
        tracing::warn!("❌ Operation {} failed: {}", id, message);
        self.progress_message = format!("{}: {}", self.text.error_prefix, message);
        self.phase = Phase::Error { message, auth_required };
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Return to idle from done or error. The previous video (if any) is handed
    /// back; dropping it releases the bytes.
    pub fn reset(&mut self) -> Result<Option<VideoHandle>, TransitionError> {
        if self.is_processing() {
            return Err(TransitionError::Busy);
        }

        let previous = std::mem::replace(&mut self.phase, Phase::Idle);
        self.progress_message.clear();
        self.started_at = None;
        self.finished_at = None;

        Ok(match previous {
            Phase::Done(handle) => Some(handle),
            _ => None,
        })
    }

    pub fn snapshot(&self) -> OperationSnapshot {
        let (error, auth_required) = match &self.phase {
            Phase::Error { message, auth_required } => (Some(message.clone()), *auth_required),
            _ => (None, false),
        };

        OperationSnapshot {
            id: self.id.clone(),
            status: self.status(),
            progress_message: self.progress_message.clone(),
            video_url: self.video().map(VideoHandle::url),
            error,
            auth_required,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }

    fn ensure_running(&self, id: &str) -> Result<(), TransitionError> {
        if !self.is_processing() {
            return Err(TransitionError::NotProcessing);
        }
        if self.id != id {
            return Err(TransitionError::StaleOperation(id.to_string()));
        }
        Ok(())
    }
}
