//! Full-text search backends
//!
//! Published content is pushed to the configured backend; queries return
//! matching content ids. Without a backend every operation is a no-op and
//! content search falls back to title matching in the database.

use crate::config::{SearchConfig, SearchProvider};
use crate::models::ContentItem;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Document pushed to the search index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchDocument {
    pub id: i64,
    pub title: String,
    pub slug: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub body: Option<String>,
}

impl SearchDocument {
    pub fn from_item(item: &ContentItem, body: Option<String>) -> Self {
        Self {
            id: item.id,
            title: item.title.clone(),
            slug: item.slug.clone(),
            content_type: item.content_type.clone(),
            body,
        }
    }
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn index(&self, document: &SearchDocument) -> Result<()>;

    async fn remove(&self, content_id: i64) -> Result<()>;

    /// Ids of matching content, best match first
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<i64>>;
}

/// Backend used when no search engine is configured
pub struct NoopSearch;

#[async_trait]
impl SearchBackend for NoopSearch {
    async fn index(&self, _document: &SearchDocument) -> Result<()> {
        Ok(())
    }

    async fn remove(&self, _content_id: i64) -> Result<()> {
        Ok(())
    }

    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<i64>> {
        Ok(Vec::new())
    }
}

/// Meilisearch over its HTTP API
pub struct MeilisearchSearch {
    client: reqwest::Client,
    base_url: String,
    index: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

impl MeilisearchSearch {
    pub fn new(base_url: &str, index: &str, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .context("Failed to create search HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/indexes/{}/{}", self.base_url, self.index, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl SearchBackend for MeilisearchSearch {
    async fn index(&self, document: &SearchDocument) -> Result<()> {
        self.authorize(self.client.post(self.url("documents")))
            .json(&[document])
            .send()
            .await
            .context("Search index request failed")?
            .error_for_status()
            .context("Search backend rejected document")?;
        Ok(())
    }

    async fn remove(&self, content_id: i64) -> Result<()> {
        self.authorize(self.client.delete(self.url(&format!("documents/{}", content_id))))
            .send()
            .await
            .context("Search delete request failed")?
            .error_for_status()
            .context("Search backend rejected delete")?;
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<i64>> {
        let response: SearchResponse = self
            .authorize(self.client.post(self.url("search")))
            .json(&serde_json::json!({ "q": query, "limit": limit }))
            .send()
            .await
            .context("Search request failed")?
            .error_for_status()
            .context("Search backend returned an error")?
            .json()
            .await
            .context("Invalid search response")?;

        Ok(response.hits.into_iter().map(|hit| hit.id).collect())
    }
}

/// Pick the backend named by the configuration.
///
/// Meilisearch without a URL degrades to [`NoopSearch`].
pub fn create_search_backend(config: &SearchConfig) -> Result<Arc<dyn SearchBackend>> {
    match (config.provider, config.url.as_deref()) {
        (SearchProvider::Meilisearch, Some(url)) if !url.is_empty() => {
            tracing::info!(url = %url, index = %config.index, "Using Meilisearch backend");
            Ok(Arc::new(MeilisearchSearch::new(
                url,
                &config.index,
                config.api_key.clone(),
            )?))
        }
        (SearchProvider::Meilisearch, _) => {
            tracing::warn!("Meilisearch selected without a URL; search indexing disabled");
            Ok(Arc::new(NoopSearch))
        }
        (SearchProvider::None, _) => Ok(Arc::new(NoopSearch)),
    }
}
