// src/video_store.rs
//! In-memory store for downloaded videos.
//!
//! A [`VideoHandle`] is the local, directly playable reference to a generated video
//! (served at `/videos/{id}`). The bytes live exactly as long as the handle: dropping
//! it releases them, so discarded results never pile up in a long-running process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StoredVideo {
    pub content_type: String,
    pub bytes: Arc<Vec<u8>>,
}

type Entries = Arc<Mutex<HashMap<Uuid, StoredVideo>>>;

#[derive(Debug, Clone, Default)]
pub struct VideoStore {
    entries: Entries,
}

fn lock(entries: &Entries) -> MutexGuard<'_, HashMap<Uuid, StoredVideo>> {
    // A panic while holding the lock cannot leave the map half-updated
    entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl VideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, bytes: Vec<u8>, content_type: impl Into<String>) -> VideoHandle {
        let id = Uuid::new_v4();
        let content_type = content_type.into();
        let size_bytes = bytes.len();

        lock(&self.entries).insert(
            id,
            StoredVideo {
                content_type: content_type.clone(),
                bytes: Arc::new(bytes),
            },
        );
        tracing::debug!("🎞️ Stored video {} ({} bytes, {})", id, size_bytes, content_type);

        VideoHandle {
            id,
            content_type,
            size_bytes,
            entries: self.entries.clone(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<StoredVideo> {
        lock(&self.entries).get(id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Owning reference to a stored video; releases the bytes on drop
#[derive(Debug)]
pub struct VideoHandle {
    id: Uuid,
    content_type: String,
    size_bytes: usize,
    entries: Entries,
}

impl VideoHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn url(&self) -> String {
        format!("/videos/{}", self.id)
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn bytes(&self) -> Option<Arc<Vec<u8>>> {
        lock(&self.entries).get(&self.id).map(|v| v.bytes.clone())
    }
}

impl Drop for VideoHandle {
    fn drop(&mut self) {
        if lock(&self.entries).remove(&self.id).is_some() {
            tracing::debug!("🗑️ Released video {}", self.id);
        }
    }
}
