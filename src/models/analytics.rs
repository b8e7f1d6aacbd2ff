//! Analytics models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PAGE_VIEW_EVENT: &str = "page_view";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub id: i64,
    pub user_id: Option<i64>,
    pub session_id: Option<String>,
    pub event_type: String,
    pub payload: Option<serde_json::Value>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAnalyticsEvent {
    pub user_id: Option<i64>,
    pub session_id: Option<String>,
    pub event_type: String,
    pub payload: Option<serde_json::Value>,
    pub occurred_at: DateTime<Utc>,
}

/// Event counts grouped by type.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnalyticsSummary {
    pub total_page_views: i64,
    pub events: BTreeMap<String, i64>,
}

/// Saved dashboard layout; `definition` is opaque to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub id: i64,
    pub name: String,
    pub definition: serde_json::Value,
    pub owner_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
