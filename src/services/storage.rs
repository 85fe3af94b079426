//! Object storage for uploaded blobs (editor images, attachments, avatars).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::AppError;

/// Where an uploaded blob ended up.
#[derive(Debug, Clone, Serialize)]
pub struct StoredObject {
    pub url: String,
    pub size: u64,
}

/// Durable storage contract: accept bytes, hand back a public URL.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, original_name: &str, bytes: Vec<u8>) -> Result<StoredObject, AppError>;
}

/// Writes blobs under a local directory that the router serves at `base_url`.
pub struct LocalObjectStore {
    root: PathBuf,
    base_url: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

/// Random object key that keeps a short alphanumeric extension of the client's file name.
fn object_key(original_name: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    let extension = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase());

    match extension {
        Some(ext) => format!("{id}.{ext}"),
        None => id,
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, original_name: &str, bytes: Vec<u8>) -> Result<StoredObject, AppError> {
        let key = object_key(original_name);
        let size = bytes.len() as u64;

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AppError::InternalServerError(format!("media dir: {e}")))?;
        tokio::fs::write(self.root.join(&key), bytes)
            .await
            .map_err(|e| AppError::InternalServerError(format!("media write: {e}")))?;

        tracing::info!(key = %key, size, "stored upload");
        Ok(StoredObject {
            url: format!("{}/{}", self.base_url, key),
            size,
        })
    }
}
