//! SEO metadata and sitemap
//!
//! Metadata is derived from a content item and its latest version:
//! - `meta_title`: title, at most 255 characters
//! - `meta_description`: latest body, at most 255 characters
//! - `canonical_url`: `/content/{slug}`
//! - Open Graph tags and a schema.org `Article` JSON-LD stub
//!
//! The sitemap lists published items and is cached until the next workflow
//! change. Each invalidation bumps a generation counter; a load that raced an
//! invalidation drops the entry it just cached.

use crate::cache::{CacheLayer, MemoryCache, SITEMAP_KEY};
use crate::db::repositories::{ContentRepository, SeoRepository};
use crate::models::{ContentItem, SeoMetadata, SeoMetadataInput, SitemapEntry};
use anyhow::Context;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const META_MAX_CHARS: usize = 255;

#[derive(Debug, thiserror::Error)]
pub enum SeoServiceError {
    #[error("Content not found")]
    ContentNotFound,

    #[error("SEO metadata not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Cut `text` to at most `max` characters
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Build metadata for `item` given its latest body
pub fn build_metadata(item: &ContentItem, latest_body: Option<&str>) -> SeoMetadataInput {
    let meta_title = truncate_chars(&item.title, META_MAX_CHARS);
    let meta_description = latest_body.map(|body| truncate_chars(body, META_MAX_CHARS));
    let canonical_url = format!("/content/{}", item.slug);

    let og_tags = json!({
        "og:title": meta_title,
        "og:description": meta_description,
        "og:type": "article",
        "og:url": canonical_url,
    });
    let schema_markup = json!({
        "@context": "https://schema.org",
        "@type": "Article",
        "headline": meta_title,
        "url": canonical_url,
        "datePublished": item.published_at,
        "dateModified": item.updated_at,
    });

    SeoMetadataInput {
        meta_title: Some(meta_title),
        meta_description,
        canonical_url: Some(canonical_url),
        og_tags: Some(og_tags),
        schema_markup: Some(schema_markup),
    }
}

pub struct SeoService {
    seo_repo: Arc<dyn SeoRepository>,
    content_repo: Arc<dyn ContentRepository>,
    cache: Arc<MemoryCache>,
    sitemap_generation: AtomicU64,
}

impl SeoService {
    pub fn new(
        seo_repo: Arc<dyn SeoRepository>,
        content_repo: Arc<dyn ContentRepository>,
        cache: Arc<MemoryCache>,
    ) -> Self {
        Self {
            seo_repo,
            content_repo,
            cache,
            sitemap_generation: AtomicU64::new(0),
        }
    }

    pub async fn get(&self, content_id: i64) -> Result<SeoMetadata, SeoServiceError> {
        self.seo_repo
            .get_by_content(content_id)
            .await
            .context("Failed to load SEO metadata")?
            .ok_or(SeoServiceError::NotFound)
    }

    pub async fn recalculate(&self, content_id: i64) -> Result<SeoMetadata, SeoServiceError> {
        let item = self
            .content_repo
            .get_by_id(content_id)
            .await
            .context("Failed to load content")?
            .ok_or(SeoServiceError::ContentNotFound)?;
        self.recalculate_for(&item).await
    }

    /// Regenerate and store the metadata of a loaded item
    pub async fn recalculate_for(&self, item: &ContentItem) -> Result<SeoMetadata, SeoServiceError> {
        let latest = self
            .content_repo
            .latest_version(item.id)
            .await
            .context("Failed to load latest version")?;

        let input = build_metadata(item, latest.as_ref().map(|v| v.body.as_str()));
        let metadata = self
            .seo_repo
            .upsert(item.id, &input)
            .await
            .context("Failed to store SEO metadata")?;

        tracing::debug!(content_id = item.id, "SEO metadata recalculated");
        Ok(metadata)
    }

    /// Published items for the sitemap, served from cache when possible
    pub async fn sitemap(&self) -> Result<Vec<SitemapEntry>, SeoServiceError> {
        match self.cache.get::<Vec<SitemapEntry>>(SITEMAP_KEY).await {
            Ok(Some(entries)) => return Ok(entries),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = ?e, "Ignoring unreadable sitemap cache entry"),
        }

        let generation = self.sitemap_generation.load(Ordering::SeqCst);
        let entries = self
            .seo_repo
            .sitemap_entries()
            .await
            .context("Failed to build sitemap")?;

        if let Err(e) = self
            .cache
            .set(SITEMAP_KEY, &entries, self.cache.default_ttl())
            .await
        {
            tracing::warn!(error = ?e, "Failed to cache sitemap");
        }
        if self.sitemap_generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("Sitemap invalidated while loading, dropping cached copy");
            self.delete_cached_sitemap().await;
        }
        Ok(entries)
    }

    pub async fn invalidate_sitemap(&self) {
        self.sitemap_generation.fetch_add(1, Ordering::SeqCst);
        self.delete_cached_sitemap().await;
    }

    async fn delete_cached_sitemap(&self) {
        if let Err(e) = self.cache.delete(SITEMAP_KEY).await {
            tracing::warn!(error = ?e, "Failed to invalidate sitemap cache");
        }
    }
}
