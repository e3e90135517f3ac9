// src/error.rs
//! Error types for the generation pipeline

use thiserror::Error;

/// Substring the provider returns when the key's project cannot see the model
/// (typically no billing enabled on the selected project).
pub const ENTITY_NOT_FOUND_SIGNATURE: &str = "Requested entity was not found";

/// Fallback used when the provider marks an operation failed without a message
pub const UNKNOWN_PROVIDER_ERROR: &str = "Unknown error reported by the AI server";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("Please upload at least one subject face image")]
    MissingSubjectImage,
    #[error("Invalid image data: {0}")]
    InvalidImage(String),
    #[error("{0}")]
    Transport(String),
    #[error("{0}")]
    Provider(String),
    #[error("Video finished generating but no download link was returned")]
    MissingResult,
    #[error("Failed to download the generated video: {0}")]
    Download(String),
    /// The selected key/project lacks access to the model; a new key must be selected.
    #[error("AUTH_REQUIRED")]
    AuthRequired,
}

impl GenerationError {
    /// Re-raise entity-not-found failures as `AuthRequired`, leave everything else alone
    pub fn classify(self) -> Self {
        if matches!(self, GenerationError::AuthRequired) {
            return self;
        }
        if self.to_string().contains(ENTITY_NOT_FOUND_SIGNATURE) {
            tracing::warn!("Provider reported entity-not-found, key selection required: {}", self);
            GenerationError::AuthRequired
        } else {
            self
        }
    }

    pub fn is_auth_required(&self) -> bool {
        matches!(self, GenerationError::AuthRequired)
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        GenerationError::Transport(format!("Request to Veo API failed: {}", err))
    }
}
