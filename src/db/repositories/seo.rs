//! SEO metadata repository

use crate::db::DynDatabasePool;
use crate::models::{SeoMetadata, SeoMetadataInput, SitemapEntry};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait SeoRepository: Send + Sync {
    /// Insert or replace the metadata of a content item
    async fn upsert(&self, content_id: i64, input: &SeoMetadataInput) -> Result<SeoMetadata>;

    async fn get_by_content(&self, content_id: i64) -> Result<Option<SeoMetadata>>;

    /// Published items, most recently modified first
    async fn sitemap_entries(&self) -> Result<Vec<SitemapEntry>>;
}

pub struct SqlxSeoRepository {
    pool: DynDatabasePool,
}

impl SqlxSeoRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SeoRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SeoRepository for SqlxSeoRepository {
    async fn upsert(&self, content_id: i64, input: &SeoMetadataInput) -> Result<SeoMetadata> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO seo_metadata (content_id, meta_title, meta_description, canonical_url,
                                      og_tags, schema_markup, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(content_id) DO UPDATE SET
                meta_title = excluded.meta_title,
                meta_description = excluded.meta_description,
                canonical_url = excluded.canonical_url,
                og_tags = excluded.og_tags,
                schema_markup = excluded.schema_markup,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(content_id)
        .bind(&input.meta_title)
        .bind(&input.meta_description)
        .bind(&input.canonical_url)
        .bind(input.og_tags.as_ref().map(|v| v.to_string()))
        .bind(input.schema_markup.as_ref().map(|v| v.to_string()))
        .bind(now)
        .bind(now)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to upsert SEO metadata")?;

        self.get_by_content(content_id)
            .await?
            .context("Upserted SEO metadata disappeared")
    }

    async fn get_by_content(&self, content_id: i64) -> Result<Option<SeoMetadata>> {
        let row = sqlx::query(
            r#"
            SELECT id, content_id, meta_title, meta_description, canonical_url, og_tags,
                   schema_markup, created_at, updated_at
            FROM seo_metadata
            WHERE content_id = ?
            "#,
        )
        .bind(content_id)
        .fetch_optional(self.pool.sqlite())
        .await
        .context("Failed to get SEO metadata")?;
        row.as_ref().map(row_to_seo).transpose()
    }

    async fn sitemap_entries(&self) -> Result<Vec<SitemapEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT slug, type, updated_at
            FROM content_items
            WHERE status = 'published'
            ORDER BY updated_at DESC, id DESC
            "#,
        )
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to build sitemap")?;

        Ok(rows
            .iter()
            .map(|row| SitemapEntry {
                slug: row.get("slug"),
                content_type: row.get("type"),
                last_modified: row.get("updated_at"),
            })
            .collect())
    }
}

fn parse_json_column(row: &SqliteRow, column: &str) -> Result<Option<serde_json::Value>> {
    let raw: Option<String> = row.get(column);
    raw.map(|text| serde_json::from_str(&text))
        .transpose()
        .with_context(|| format!("Invalid JSON in seo_metadata.{}", column))
}

fn row_to_seo(row: &SqliteRow) -> Result<SeoMetadata> {
    Ok(SeoMetadata {
        id: row.get("id"),
        content_id: row.get("content_id"),
        meta_title: row.get("meta_title"),
        meta_description: row.get("meta_description"),
        canonical_url: row.get("canonical_url"),
        og_tags: parse_json_column(row, "og_tags")?,
        schema_markup: parse_json_column(row, "schema_markup")?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> (DynDatabasePool, SqlxSeoRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        sqlx::query(
            r#"INSERT INTO content_items (type, title, slug, status, workflow_state, updated_at)
               VALUES ('article', 'Live', 'live', 'published', 'published', '2024-05-01T10:00:00Z'),
                      ('page', 'Draft', 'draft', 'draft', 'draft', '2024-05-02T10:00:00Z')"#,
        )
        .execute(pool.sqlite())
        .await
        .unwrap();
        (pool.clone(), SqlxSeoRepository::new(pool))
    }

    fn input(title: &str) -> SeoMetadataInput {
        SeoMetadataInput {
            meta_title: Some(title.to_string()),
            meta_description: None,
            canonical_url: Some("/content/live".to_string()),
            og_tags: Some(serde_json::json!({"og:title": title})),
            schema_markup: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_row() {
        let (_pool, repo) = setup().await;

        let first = repo.upsert(1, &input("First")).await.unwrap();
        let second = repo.upsert(1, &input("Second")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.meta_title.as_deref(), Some("Second"));
        assert_eq!(second.og_tags.unwrap()["og:title"], "Second");
        assert!(repo.get_by_content(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sitemap_lists_published_only() {
        let (_pool, repo) = setup().await;

        let entries = repo.sitemap_entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].slug, "live");
        assert_eq!(entries[0].content_type, "article");
    }
}
