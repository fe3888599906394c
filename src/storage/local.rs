use std::path::PathBuf;

use crate::error::{AppError, AppResult};

use super::{is_plain_key, StorageBackend};

/// URL prefix under which the local upload directory is served.
pub const LOCAL_PUBLIC_PREFIX: &str = "/uploads/";

pub struct LocalBackend {
    root: PathBuf,
    name: String,
}

impl LocalBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = root.display().to_string();
        Self { root, name }
    }
}

#[async_trait::async_trait]
impl StorageBackend for LocalBackend {
    async fn upload(&self, key: &str, data: &[u8], _content_type: &str) -> AppResult<String> {
        if !is_plain_key(key) {
            return Err(AppError::Storage(format!("refusing key '{}'", key)));
        }
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AppError::Storage(format!("Local mkdir failed: {}", e)))?;
        tokio::fs::write(self.root.join(key), data)
            .await
            .map_err(|e| AppError::Storage(format!("Local write failed: {}", e)))?;

        tracing::info!("Local upload: dir={}, key={}", self.name, key);
        Ok(format!("{}{}", LOCAL_PUBLIC_PREFIX, key))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        if !is_plain_key(key) {
            return Err(AppError::Storage(format!("refusing key '{}'", key)));
        }
        tokio::fs::remove_file(self.root.join(key))
            .await
            .map_err(|e| AppError::Storage(format!("Local delete failed: {}", e)))?;

        tracing::info!("Local delete: dir={}, key={}", self.name, key);
        Ok(())
    }

    fn key_for_reference(&self, reference: &str) -> Option<String> {
        reference
            .strip_prefix(LOCAL_PUBLIC_PREFIX)
            .filter(|key| is_plain_key(key))
            .map(str::to_string)
    }

    fn bucket(&self) -> &str {
        &self.name
    }
}
