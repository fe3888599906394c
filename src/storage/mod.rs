// Blob storage for item images: local directory or Cloudflare R2

pub mod local;
pub mod r2;
pub mod resolver;

pub use local::LocalBackend;
pub use r2::R2Backend;
pub use resolver::{BlobReferenceResolver, UploadedFile};

use crate::error::AppResult;

/// Where image bytes live. Items only ever hold the returned reference string.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Stores the bytes under `key` and returns the stable reference.
    async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<String>;

    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Recovers the key from a reference this backend issued.
    fn key_for_reference(&self, reference: &str) -> Option<String>;

    fn bucket(&self) -> &str;
}

/// Keys are flat file names; anything path-like is rejected.
pub(crate) fn is_plain_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && !key.contains('/')
        && !key.contains('\\')
        && !key.contains("..")
}
