//! Analytics events and dashboards

use crate::db::is_unique_violation;
use crate::db::repositories::AnalyticsRepository;
use crate::models::{AnalyticsEvent, AnalyticsSummary, Dashboard, NewAnalyticsEvent, User, PAGE_VIEW_EVENT};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Default and maximum number of events returned by `recent_events`
pub const MAX_RECENT_EVENTS: i64 = 200;

#[derive(Debug, thiserror::Error)]
pub enum AnalyticsServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Dashboard '{0}' already exists")]
    DashboardExists(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Event as submitted by a client
#[derive(Debug, Clone, Default)]
pub struct TrackEvent {
    pub event_type: String,
    pub session_id: Option<String>,
    pub payload: Option<serde_json::Value>,
    pub occurred_at: Option<DateTime<Utc>>,
}

pub struct AnalyticsService {
    repo: Arc<dyn AnalyticsRepository>,
    enabled: bool,
}

impl AnalyticsService {
    pub fn new(repo: Arc<dyn AnalyticsRepository>, enabled: bool) -> Self {
        Self { repo, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Store an event; returns `None` when collection is disabled
    pub async fn track(
        &self,
        user: Option<&User>,
        event: TrackEvent,
    ) -> Result<Option<AnalyticsEvent>, AnalyticsServiceError> {
        let event_type = event.event_type.trim();
        if event_type.is_empty() {
            return Err(AnalyticsServiceError::ValidationError(
                "Event type cannot be empty".to_string(),
            ));
        }
        if !self.enabled {
            return Ok(None);
        }

        let stored = self
            .repo
            .insert_event(&NewAnalyticsEvent {
                user_id: user.map(|u| u.id),
                session_id: event.session_id,
                event_type: event_type.to_string(),
                payload: event.payload,
                occurred_at: event.occurred_at.unwrap_or_else(Utc::now),
            })
            .await
            .context("Failed to store analytics event")?;
        Ok(Some(stored))
    }

    pub async fn summary(&self) -> Result<AnalyticsSummary, AnalyticsServiceError> {
        let counts = self
            .repo
            .count_by_type()
            .await
            .context("Failed to count events")?;

        let events: std::collections::BTreeMap<String, i64> = counts.into_iter().collect();
        Ok(AnalyticsSummary {
            total_page_views: events.get(PAGE_VIEW_EVENT).copied().unwrap_or(0),
            events,
        })
    }

    /// Latest events, newest first; `limit` is clamped to 1..=200
    pub async fn recent_events(&self, limit: Option<i64>) -> Result<Vec<AnalyticsEvent>, AnalyticsServiceError> {
        let limit = limit.unwrap_or(MAX_RECENT_EVENTS).clamp(1, MAX_RECENT_EVENTS);
        Ok(self
            .repo
            .recent_events(limit)
            .await
            .context("Failed to load events")?)
    }

    pub async fn list_dashboards(&self) -> Result<Vec<Dashboard>, AnalyticsServiceError> {
        Ok(self
            .repo
            .list_dashboards()
            .await
            .context("Failed to list dashboards")?)
    }

    pub async fn create_dashboard(
        &self,
        owner: &User,
        name: &str,
        definition: serde_json::Value,
    ) -> Result<Dashboard, AnalyticsServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AnalyticsServiceError::ValidationError(
                "Dashboard name cannot be empty".to_string(),
            ));
        }

        self.repo
            .create_dashboard(name, &definition, Some(owner.id))
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AnalyticsServiceError::DashboardExists(name.to_string())
                } else {
                    AnalyticsServiceError::InternalError(e.context("Failed to create dashboard"))
                }
            })
    }
}
