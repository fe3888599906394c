use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::MAX_IMAGES;

use super::StorageBackend;

const ALLOWED_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "gif"];

/// A file as received from a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Turns uploads into stable references and vouches for references
/// before they are attached to an item.
pub struct BlobReferenceResolver {
    backend: Arc<dyn StorageBackend>,
    max_bytes: usize,
}

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

impl BlobReferenceResolver {
    pub fn new(backend: Arc<dyn StorageBackend>, max_bytes: usize) -> Self {
        Self { backend, max_bytes }
    }

    /// Type and size checks, done before anything is stored.
    pub fn check_asset(&self, file: &UploadedFile) -> AppResult<String> {
        let ext = extension_of(&file.filename)
            .filter(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()))
            .ok_or_else(|| AppError::InvalidAsset("Only image files are allowed".to_string()))?;

        let content_type = file.content_type.to_ascii_lowercase();
        let subtype_ok = content_type
            .strip_prefix("image/")
            .is_some_and(|sub| ALLOWED_EXTENSIONS.contains(&sub));
        if !subtype_ok {
            return Err(AppError::InvalidAsset(
                "Only image files are allowed".to_string(),
            ));
        }

        if file.data.is_empty() {
            return Err(AppError::InvalidAsset(format!(
                "{} is empty",
                file.filename
            )));
        }
        if file.data.len() > self.max_bytes {
            return Err(AppError::InvalidAsset(format!(
                "{} exceeds the {} byte limit",
                file.filename, self.max_bytes
            )));
        }
        Ok(ext)
    }

    /// Validates and stores one upload, returning its reference.
    pub async fn resolve(&self, file: &UploadedFile) -> AppResult<String> {
        let ext = self.check_asset(file)?;
        let key = format!(
            "images-{}-{}.{}",
            chrono::Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            ext
        );
        self.backend
            .upload(&key, &file.data, &file.content_type)
            .await
    }

    /// All-or-nothing: every file is checked first, and a failed upload
    /// discards the ones already stored.
    pub async fn resolve_all(&self, files: &[UploadedFile]) -> AppResult<Vec<String>> {
        if files.len() > MAX_IMAGES {
            return Err(AppError::Input(format!(
                "At most {} images can be uploaded at once",
                MAX_IMAGES
            )));
        }
        for file in files {
            self.check_asset(file)?;
        }

        let mut references = Vec::with_capacity(files.len());
        for file in files {
            match self.resolve(file).await {
                Ok(reference) => references.push(reference),
                Err(e) => {
                    self.discard(&references).await;
                    return Err(e);
                }
            }
        }
        Ok(references)
    }

    /// Rejects references this deployment's storage did not issue.
    pub fn verify(&self, reference: &str) -> AppResult<()> {
        self.backend
            .key_for_reference(reference)
            .map(|_| ())
            .ok_or_else(|| AppError::Input(format!("Unrecognized image reference '{}'", reference)))
    }

    /// Best-effort removal; failures are logged and swallowed.
    pub async fn discard(&self, references: &[String]) {
        for reference in references {
            let Some(key) = self.backend.key_for_reference(reference) else {
                tracing::warn!("Not discarding unrecognized reference {}", reference);
                continue;
            };
            if let Err(e) = self.backend.delete(&key).await {
                tracing::warn!("Failed to discard blob {}: {}", reference, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalBackend;

    fn png(name: &str, size: usize) -> UploadedFile {
        UploadedFile {
            filename: name.to_string(),
            content_type: "image/png".to_string(),
            data: Bytes::from(vec![7u8; size]),
        }
    }

    fn resolver(dir: &Path) -> BlobReferenceResolver {
        BlobReferenceResolver::new(Arc::new(LocalBackend::new(dir)), 1024)
    }

    #[test]
    fn test_check_asset_types() {
        let r = resolver(Path::new("unused"));
        assert_eq!(r.check_asset(&png("photo.PNG", 10)).unwrap(), "png");

        let pdf = UploadedFile {
            filename: "notes.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            data: Bytes::from_static(b"%PDF"),
        };
        assert!(matches!(r.check_asset(&pdf), Err(AppError::InvalidAsset(_))));

        let disguised = UploadedFile {
            content_type: "text/html".to_string(),
            ..png("evil.png", 10)
        };
        assert!(matches!(
            r.check_asset(&disguised),
            Err(AppError::InvalidAsset(_))
        ));
    }

    #[test]
    fn test_check_asset_size() {
        let r = resolver(Path::new("unused"));
        assert!(r.check_asset(&png("big.png", 1024)).is_ok());
        assert!(matches!(
            r.check_asset(&png("big.png", 1025)),
            Err(AppError::InvalidAsset(_))
        ));
        assert!(r.check_asset(&png("empty.png", 0)).is_err());
    }

    #[tokio::test]
    async fn test_resolve_all_and_verify() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path());
        let refs = r
            .resolve_all(&[png("a.png", 10), png("b.gif", 10)])
            .await;
        // b.gif is declared image/png: subtype png is allowed, extension gif is allowed
        let refs = refs.unwrap();
        assert_eq!(refs.len(), 2);
        assert_ne!(refs[0], refs[1]);
        for reference in &refs {
            r.verify(reference).unwrap();
            assert!(reference.starts_with("/uploads/images-"));
        }
        assert!(r.verify("https://elsewhere.example/x.png").is_err());

        r.discard(&refs).await;
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_resolve_all_rejects_batch_with_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path());
        let err = r
            .resolve_all(&[png("a.png", 10), png("b.png", 5000)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidAsset(_)));
        assert!(!dir.path().exists() || std::fs::read_dir(dir.path()).unwrap().count() == 0);
    }

    #[tokio::test]
    async fn test_resolve_all_rejects_too_many() {
        let r = resolver(Path::new("unused"));
        let files: Vec<_> = (0..6).map(|i| png(&format!("{}.png", i), 1)).collect();
        assert!(matches!(
            r.resolve_all(&files).await,
            Err(AppError::Input(_))
        ));
    }
}
