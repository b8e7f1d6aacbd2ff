//! Media repository
//!
//! Database operations for media assets and their variants.

use crate::db::DynDatabasePool;
use crate::models::{CreateMediaInput, MediaAsset, MediaType, MediaVariant};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// Insert an asset and its variants atomically
    async fn create(&self, input: &CreateMediaInput) -> Result<MediaAsset>;

    async fn get_by_id(&self, id: i64) -> Result<Option<MediaAsset>>;

    /// All assets, newest first, with variants
    async fn list(&self) -> Result<Vec<MediaAsset>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Number of assets whose `storage_url` is exactly `storage_url`
    async fn count_by_storage_url(&self, storage_url: &str) -> Result<i64>;
}

pub struct SqlxMediaRepository {
    pool: DynDatabasePool,
}

impl SqlxMediaRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn MediaRepository> {
        Arc::new(Self::new(pool))
    }
}

const MEDIA_COLUMNS: &str = r#"
    id, type, filename, storage_url, checksum, width, height, duration, metadata, uploaded_by,
    created_at, updated_at
"#;

#[async_trait]
impl MediaRepository for SqlxMediaRepository {
    async fn create(&self, input: &CreateMediaInput) -> Result<MediaAsset> {
        let id = create_media(self.pool.sqlite(), input).await?;
        self.get_by_id(id).await?.context("Created media disappeared")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<MediaAsset>> {
        let pool = self.pool.sqlite();
        let sql = format!("SELECT {} FROM media_assets WHERE id = ?", MEDIA_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get media by ID")?;

        match row {
            Some(row) => {
                let mut asset = row_to_media(&row)?;
                asset.variants = variants_for(pool, id).await?;
                Ok(Some(asset))
            }
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<MediaAsset>> {
        let pool = self.pool.sqlite();
        let sql = format!("SELECT {} FROM media_assets ORDER BY created_at DESC, id DESC", MEDIA_COLUMNS);
        let rows = sqlx::query(&sql)
            .fetch_all(pool)
            .await
            .context("Failed to list media")?;

        let variant_rows = sqlx::query(
            "SELECT id, media_id, format, url, width, height, bitrate, created_at FROM media_variants ORDER BY id",
        )
        .fetch_all(pool)
        .await
        .context("Failed to list media variants")?;

        let mut variants_by_media: HashMap<i64, Vec<MediaVariant>> = HashMap::new();
        for row in &variant_rows {
            variants_by_media
                .entry(row.get("media_id"))
                .or_default()
                .push(row_to_variant(row));
        }

        rows.iter()
            .map(|row| {
                let mut asset = row_to_media(row)?;
                asset.variants = variants_by_media.remove(&asset.id).unwrap_or_default();
                Ok(asset)
            })
            .collect()
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM media_assets WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete media")?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_by_storage_url(&self, storage_url: &str) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM media_assets WHERE storage_url = ?")
            .bind(storage_url)
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to count media by storage URL")
    }
}

async fn create_media(pool: &SqlitePool, input: &CreateMediaInput) -> Result<i64> {
    let now = Utc::now();
    let metadata = input.metadata.as_ref().map(|m| m.to_string());
    let mut tx = pool.begin().await.context("Failed to start transaction")?;

    let result = sqlx::query(
        r#"
        INSERT INTO media_assets (type, filename, storage_url, checksum, width, height, duration,
                                  metadata, uploaded_by, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.media_type.to_string())
    .bind(&input.filename)
    .bind(&input.storage_url)
    .bind(&input.checksum)
    .bind(input.width)
    .bind(input.height)
    .bind(input.duration)
    .bind(&metadata)
    .bind(input.uploaded_by)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create media")?;

    let id = result.last_insert_rowid();

    for variant in &input.variants {
        sqlx::query(
            r#"
            INSERT INTO media_variants (media_id, format, url, width, height, bitrate, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&variant.format)
        .bind(&variant.url)
        .bind(variant.width)
        .bind(variant.height)
        .bind(variant.bitrate)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create media variant")?;
    }

    tx.commit().await.context("Failed to commit media")?;
    Ok(id)
}

async fn variants_for(pool: &SqlitePool, media_id: i64) -> Result<Vec<MediaVariant>> {
    let rows = sqlx::query(
        "SELECT id, media_id, format, url, width, height, bitrate, created_at FROM media_variants WHERE media_id = ? ORDER BY id",
    )
    .bind(media_id)
    .fetch_all(pool)
    .await
    .context("Failed to load media variants")?;
    Ok(rows.iter().map(row_to_variant).collect())
}

fn row_to_media(row: &SqliteRow) -> Result<MediaAsset> {
    let type_str: String = row.get("type");
    let media_type = MediaType::from_str(&type_str)
        .with_context(|| format!("Invalid media type in database: {}", type_str))?;
    let metadata: Option<String> = row.get("metadata");
    let metadata = metadata
        .map(|m| serde_json::from_str(&m))
        .transpose()
        .context("Invalid media metadata in database")?;

    Ok(MediaAsset {
        id: row.get("id"),
        media_type,
        filename: row.get("filename"),
        storage_url: row.get("storage_url"),
        checksum: row.get("checksum"),
        width: row.get("width"),
        height: row.get("height"),
        duration: row.get("duration"),
        metadata,
        uploaded_by: row.get("uploaded_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        variants: Vec::new(),
    })
}

fn row_to_variant(row: &SqliteRow) -> MediaVariant {
    MediaVariant {
        id: row.get("id"),
        format: row.get("format"),
        url: row.get("url"),
        width: row.get("width"),
        height: row.get("height"),
        bitrate: row.get("bitrate"),
        created_at: row.get("created_at"),
    }
}
