//! Media service
//!
//! Media assets are either registered by URL (with pre-rendered variants) or
//! uploaded. Uploads are stored under `upload.path` as `<uuid>.<ext>` and
//! served below `upload.public_prefix`.

use crate::config::UploadConfig;
use crate::db::is_unique_violation;
use crate::db::repositories::MediaRepository;
use crate::models::{CreateMediaInput, MediaAsset, MediaType, User};
use crate::services::audit;
use anyhow::Context;
use data_encoding::HEXLOWER;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum MediaServiceError {
    #[error("Media not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Hex SHA-256 of `data`
pub fn checksum(data: &[u8]) -> String {
    HEXLOWER.encode(&Sha256::digest(data))
}

pub struct MediaService {
    media_repo: Arc<dyn MediaRepository>,
    config: Arc<UploadConfig>,
}

impl MediaService {
    pub fn new(media_repo: Arc<dyn MediaRepository>, config: Arc<UploadConfig>) -> Self {
        Self { media_repo, config }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub async fn list(&self) -> Result<Vec<MediaAsset>, MediaServiceError> {
        Ok(self.media_repo.list().await.context("Failed to list media")?)
    }

    pub async fn get(&self, id: i64) -> Result<MediaAsset, MediaServiceError> {
        self.media_repo
            .get_by_id(id)
            .await
            .context("Failed to get media")?
            .ok_or(MediaServiceError::NotFound)
    }

    /// Register an externally stored asset with its variants
    pub async fn register(
        &self,
        uploader: &User,
        mut input: CreateMediaInput,
    ) -> Result<MediaAsset, MediaServiceError> {
        if input.filename.trim().is_empty() {
            return Err(MediaServiceError::ValidationError(
                "Filename cannot be empty".to_string(),
            ));
        }
        if input.storage_url.trim().is_empty() {
            return Err(MediaServiceError::ValidationError(
                "Storage URL cannot be empty".to_string(),
            ));
        }
        let mut formats = HashSet::new();
        if let Some(dup) = input.variants.iter().find(|v| !formats.insert(v.format.as_str())) {
            return Err(MediaServiceError::Conflict(format!(
                "Duplicate variant format '{}'",
                dup.format
            )));
        }

        input.uploaded_by = Some(uploader.id);
        self.insert(uploader, &input).await
    }

    /// Store an uploaded file and register it
    pub async fn upload(
        &self,
        uploader: &User,
        original_name: Option<&str>,
        content_type: &str,
        data: &[u8],
    ) -> Result<MediaAsset, MediaServiceError> {
        if !self.config.is_type_allowed(content_type) {
            return Err(MediaServiceError::ValidationError(format!(
                "Invalid file type: {}. Allowed types: {}",
                content_type,
                self.config.allowed_types.join(", ")
            )));
        }
        if data.len() as u64 > self.config.max_file_size {
            return Err(MediaServiceError::ValidationError(format!(
                "File too large. Maximum size: {} bytes",
                self.config.max_file_size
            )));
        }

        fs::create_dir_all(&self.config.path)
            .await
            .with_context(|| format!("Failed to create upload directory {:?}", self.config.path))?;

        let stored_name = format!("{}.{}", Uuid::new_v4(), self.config.get_extension(content_type));
        let file_path = self.config.path.join(&stored_name);
        fs::write(&file_path, data)
            .await
            .with_context(|| format!("Failed to write upload {:?}", file_path))?;

        let filename = original_name
            .map(|n| n.rsplit(['/', '\\']).next().unwrap_or(n).trim())
            .filter(|n| !n.is_empty())
            .unwrap_or(&stored_name)
            .to_string();

        let input = CreateMediaInput {
            media_type: MediaType::from_mime(content_type),
            filename,
            storage_url: format!("{}/{}", self.config.public_prefix.trim_end_matches('/'), stored_name),
            checksum: Some(checksum(data)),
            width: None,
            height: None,
            duration: None,
            metadata: Some(serde_json::json!({
                "content_type": content_type,
                "size": data.len(),
            })),
            uploaded_by: Some(uploader.id),
            variants: vec![],
        };

        match self.insert(uploader, &input).await {
            Ok(asset) => Ok(asset),
            Err(e) => {
                let _ = fs::remove_file(&file_path).await;
                Err(e)
            }
        }
    }

    async fn insert(&self, uploader: &User, input: &CreateMediaInput) -> Result<MediaAsset, MediaServiceError> {
        let asset = self.media_repo.create(input).await.map_err(|e| {
            if is_unique_violation(&e) {
                MediaServiceError::Conflict("Duplicate variant format".to_string())
            } else {
                MediaServiceError::InternalError(e.context("Failed to create media"))
            }
        })?;

        audit::record("media.created", Some(uploader.id), &asset.storage_url);
        Ok(asset)
    }

    /// Delete an asset; a locally stored file no other asset points at is removed best-effort
    pub async fn delete(&self, actor: &User, id: i64) -> Result<(), MediaServiceError> {
        let asset = self.get(id).await?;
        if !self
            .media_repo
            .delete(id)
            .await
            .context("Failed to delete media")?
        {
            return Err(MediaServiceError::NotFound);
        }

        if let Some(path) = self.local_path(&asset.storage_url) {
            let references = self
                .media_repo
                .count_by_storage_url(&asset.storage_url)
                .await
                .context("Failed to check media references")?;
            if references > 0 {
                tracing::debug!(path = ?path, references, "Media file still referenced, keeping it");
            } else if let Err(e) = fs::remove_file(&path).await {
                tracing::warn!(path = ?path, error = %e, "Failed to remove media file");
            }
        }

        audit::record("media.deleted", Some(actor.id), &format!("media:{}", id));
        Ok(())
    }

    /// File behind a storage URL under the public upload prefix
    fn local_path(&self, storage_url: &str) -> Option<PathBuf> {
        let prefix = format!("{}/", self.config.public_prefix.trim_end_matches('/'));
        let name = storage_url.strip_prefix(&prefix)?;
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return None;
        }
        Some(self.config.path.join(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxMediaRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateUserInput, CreateVariantInput};
    use tempfile::TempDir;

    async fn setup_test_service(dir: &TempDir) -> (User, MediaService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user = SqlxUserRepository::new(pool.clone())
            .create(&CreateUserInput {
                email: "author@example.com".to_string(),
                hashed_password: "hash".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let config = UploadConfig {
            path: dir.path().join("uploads"),
            max_file_size: 1024,
            ..Default::default()
        };
        (user, MediaService::new(SqlxMediaRepository::boxed(pool), Arc::new(config)))
    }

    fn register_input(variants: Vec<&str>) -> CreateMediaInput {
        CreateMediaInput {
            media_type: MediaType::Video,
            filename: "clip.mp4".to_string(),
            storage_url: "https://cdn.example.com/clip.mp4".to_string(),
            checksum: None,
            width: Some(1920),
            height: Some(1080),
            duration: Some(12.5),
            metadata: None,
            uploaded_by: None,
            variants: variants
                .into_iter()
                .map(|format| CreateVariantInput {
                    format: format.to_string(),
                    url: format!("https://cdn.example.com/clip-{}.mp4", format),
                    width: None,
                    height: None,
                    bitrate: Some(2_000_000),
                })
                .collect(),
        }
    }

    #[test]
    fn test_checksum() {
        assert_eq!(
            checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_register_with_variants() {
        let dir = TempDir::new().unwrap();
        let (user, service) = setup_test_service(&dir).await;

        let asset = service
            .register(&user, register_input(vec!["720p", "480p"]))
            .await
            .unwrap();
        assert_eq!(asset.uploaded_by, Some(user.id));
        assert_eq!(asset.variants.len(), 2);
        assert_eq!(asset.duration, Some(12.5));

        let result = service.register(&user, register_input(vec!["720p", "720p"])).await;
        assert!(matches!(result, Err(MediaServiceError::Conflict(_))));
        assert_eq!(service.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_writes_file() {
        let dir = TempDir::new().unwrap();
        let (user, service) = setup_test_service(&dir).await;

        let asset = service
            .upload(&user, Some("C:\\photos\\cat.png"), "image/png", b"not really a png")
            .await
            .unwrap();

        assert_eq!(asset.media_type, MediaType::Image);
        assert_eq!(asset.filename, "cat.png");
        assert!(asset.storage_url.starts_with("/uploads/"));
        assert!(asset.storage_url.ends_with(".png"));
        assert_eq!(asset.checksum.as_deref(), Some(checksum(b"not really a png").as_str()));

        let path = service.local_path(&asset.storage_url).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"not really a png");

        service.delete(&user, asset.id).await.unwrap();
        assert!(!path.exists());
        assert!(matches!(service.get(asset.id).await, Err(MediaServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_delete_keeps_file_shared_with_registered_asset() {
        let dir = TempDir::new().unwrap();
        let (user, service) = setup_test_service(&dir).await;

        let uploaded = service
            .upload(&user, Some("cat.png"), "image/png", b"pixels")
            .await
            .unwrap();
        let path = service.local_path(&uploaded.storage_url).unwrap();

        let mut input = register_input(vec![]);
        input.storage_url = uploaded.storage_url.clone();
        let registered = service.register(&user, input).await.unwrap();

        service.delete(&user, registered.id).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"pixels");

        service.delete(&user, uploaded.id).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_upload_rejections() {
        let dir = TempDir::new().unwrap();
        let (user, service) = setup_test_service(&dir).await;

        let result = service.upload(&user, None, "application/x-msdownload", b"MZ").await;
        assert!(matches!(result, Err(MediaServiceError::ValidationError(_))));

        let big = vec![0u8; 2048];
        let result = service.upload(&user, None, "image/png", &big).await;
        assert!(matches!(result, Err(MediaServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_delete_remote_asset() {
        let dir = TempDir::new().unwrap();
        let (user, service) = setup_test_service(&dir).await;
        let asset = service.register(&user, register_input(vec![])).await.unwrap();

        service.delete(&user, asset.id).await.unwrap();
        assert!(matches!(
            service.delete(&user, asset.id).await,
            Err(MediaServiceError::NotFound)
        ));
    }

    #[test]
    fn test_local_path_rejects_traversal() {
        let service_config = UploadConfig::default();
        let dir = service_config.path.clone();
        let service = MediaService {
            media_repo: Arc::new(NoMedia),
            config: Arc::new(service_config),
        };
        assert_eq!(service.local_path("/uploads/a.png"), Some(dir.join("a.png")));
        assert_eq!(service.local_path("/uploads/../etc/passwd"), None);
        assert_eq!(service.local_path("/uploads/.hidden"), None);
        assert_eq!(service.local_path("https://cdn.example.com/a.png"), None);
    }

    struct NoMedia;

    #[async_trait::async_trait]
    impl MediaRepository for NoMedia {
        async fn create(&self, _input: &CreateMediaInput) -> anyhow::Result<MediaAsset> {
            anyhow::bail!("unused")
        }
        async fn get_by_id(&self, _id: i64) -> anyhow::Result<Option<MediaAsset>> {
            Ok(None)
        }
        async fn list(&self) -> anyhow::Result<Vec<MediaAsset>> {
            Ok(vec![])
        }
        async fn delete(&self, _id: i64) -> anyhow::Result<bool> {
            Ok(false)
        }
        async fn count_by_storage_url(&self, _storage_url: &str) -> anyhow::Result<i64> {
            Ok(0)
        }
    }
}
