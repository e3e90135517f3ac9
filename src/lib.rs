// lib.rs - Veo studio: subject/product images + prompts in, generated video out
pub mod config;
pub mod credentials;
pub mod error;
pub mod form;
pub mod generation;
pub mod handlers;
pub mod intake;
pub mod middleware;
pub mod operation;
pub mod request;
pub mod studio;
pub mod veo_client;
pub mod video_store;

use std::sync::Arc;
use tokio::sync::RwLock;

// Re-export commonly used types for convenience
pub use config::Config;
pub use credentials::KeySelector;
pub use error::GenerationError;
pub use form::{AspectRatio, FormState, SlotIndex};
pub use generation::{GenerationClient, PollPolicy, ProgressSink, VideoProvider};
pub use intake::{EncodedImage, ImageSource};
pub use operation::{OperationSnapshot, OperationStatus, OperationTracker};
pub use request::{GenerationParams, PromptLocale, VideoGenerationRequest};
pub use veo_client::VeoClient;
pub use video_store::{VideoHandle, VideoStore};

// AppState holds the single studio form, the operation being tracked, downloaded
// videos and the API key selection
pub struct AppState {
    pub config: Config,
    pub form: RwLock<FormState>,
    pub operation: RwLock<OperationTracker>,
    pub videos: VideoStore,
    pub key_selector: Arc<dyn KeySelector>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let key_selector = Arc::new(credentials::SharedKeySelector::new(config.api_key.clone()));
        Self::with_key_selector(config, key_selector)
    }

    pub fn with_key_selector(config: Config, key_selector: Arc<dyn KeySelector>) -> Self {
        let operation = OperationTracker::with_locale(config.prompt_locale);
        Self {
            config,
            form: RwLock::new(FormState::new()),
            operation: RwLock::new(operation),
            videos: VideoStore::new(),
            key_selector,
        }
    }
}
