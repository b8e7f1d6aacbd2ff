//! SEO metadata and sitemap models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Search-engine metadata derived from a content item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeoMetadata {
    pub id: i64,
    pub content_id: i64,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub canonical_url: Option<String>,
    pub og_tags: Option<serde_json::Value>,
    pub schema_markup: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values written by an SEO recalculation.
#[derive(Debug, Clone, PartialEq)]
pub struct SeoMetadataInput {
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub canonical_url: Option<String>,
    pub og_tags: Option<serde_json::Value>,
    pub schema_markup: Option<serde_json::Value>,
}

/// One published item in the sitemap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SitemapEntry {
    pub slug: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub last_modified: DateTime<Utc>,
}
