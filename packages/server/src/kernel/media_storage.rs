use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::BaseMediaStorage;

/// Stores media on the local filesystem and serves it under `base_url`.
pub struct LocalMediaStorage {
    dir: PathBuf,
    base_url: String,
}

impl LocalMediaStorage {
    pub fn new(dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(extension: &str) -> String {
        let extension = extension.trim_start_matches('.');
        if extension.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            format!("{}.{}", Uuid::new_v4(), extension)
        }
    }
}

#[async_trait]
impl BaseMediaStorage for LocalMediaStorage {
    async fn store_media(&self, bytes: Vec<u8>, extension: &str) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create media dir {}", self.dir.display()))?;

        let name = Self::file_name(extension);
        let path = self.dir.join(&name);
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write media file {}", path.display()))?;

        debug!(path = %path.display(), bytes = bytes.len(), "media stored");
        Ok(format!("{}/{}", self.base_url, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_file_and_returns_public_url() {
        let dir = std::env::temp_dir().join(format!("clipforge-media-{}", Uuid::new_v4()));
        let storage = LocalMediaStorage::new(&dir, "http://localhost:8080/media/");

        let url = storage.store_media(b"mp3".to_vec(), "mp3").await.unwrap();
        assert!(url.starts_with("http://localhost:8080/media/"));
        assert!(url.ends_with(".mp3"));

        let name = url.rsplit('/').next().unwrap();
        let stored = tokio::fs::read(dir.join(name)).await.unwrap();
        assert_eq!(stored, b"mp3");

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
