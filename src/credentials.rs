// src/credentials.rs
//! API key selection capability.
//!
//! The studio only talks to the [`KeySelector`] trait. `SharedKeySelector` keeps the
//! key in-process: seeded from the environment, replaced over HTTP, and invalidated
//! when the provider says the key's project cannot use the model.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CredentialError {
    #[error("API key must not be empty")]
    EmptyKey,
    #[error("Key selection is unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait KeySelector: Send + Sync {
    async fn has_selected_key(&self) -> bool;

    /// Ask the host for a (new) key. Afterwards `has_selected_key` reflects whether
    /// one is usable yet.
    async fn request_key_selection(&self) -> Result<(), CredentialError>;

    async fn current_key(&self) -> Option<String>;

    /// Store the key the user picked
    async fn select_key(&self, key: String) -> Result<(), CredentialError>;

    /// Whether a new selection was asked for and not answered yet
    async fn selection_requested(&self) -> bool;
}

#[derive(Debug, Default)]
struct KeyState {
    key: Option<String>,
    selection_requested: bool,
}

#[derive(Debug, Default)]
pub struct SharedKeySelector {
    state: RwLock<KeyState>,
}

impl SharedKeySelector {
    pub fn new(initial_key: Option<String>) -> Self {
        Self {
            state: RwLock::new(KeyState {
                key: initial_key.filter(|k| !k.trim().is_empty()),
                selection_requested: false,
            }),
        }
    }

}

#[async_trait]
impl KeySelector for SharedKeySelector {
    async fn has_selected_key(&self) -> bool {
        self.state.read().await.key.is_some()
    }

    async fn request_key_selection(&self) -> Result<(), CredentialError> {
        let mut state = self.state.write().await;
        // the current key was rejected, so it must not be reused
        state.key = None;
        state.selection_requested = true;
        tracing::warn!("🔑 Key selection requested: select a key from a project with billing enabled");
        Ok(())
    }

    async fn current_key(&self) -> Option<String> {
        self.state.read().await.key.clone()
    }

    async fn select_key(&self, key: String) -> Result<(), CredentialError> {
        let key = key.trim().to_string();
        if key.is_empty() {
            return Err(CredentialError::EmptyKey);
        }
        let mut state = self.state.write().await;
        state.key = Some(key);
        state.selection_requested = false;
        tracing::info!("🔑 API key selected");
        Ok(())
    }

    async fn selection_requested(&self) -> bool {
        self.state.read().await.selection_requested
    }
}
