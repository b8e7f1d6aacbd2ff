//! Analytics repository
//!
//! Event log and saved dashboards.

use crate::db::DynDatabasePool;
use crate::models::{AnalyticsEvent, Dashboard, NewAnalyticsEvent};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    async fn insert_event(&self, event: &NewAnalyticsEvent) -> Result<AnalyticsEvent>;

    /// Most recent events first
    async fn recent_events(&self, limit: i64) -> Result<Vec<AnalyticsEvent>>;

    /// `(event_type, count)` pairs ordered by type
    async fn count_by_type(&self) -> Result<Vec<(String, i64)>>;

    async fn list_dashboards(&self) -> Result<Vec<Dashboard>>;

    async fn create_dashboard(
        &self,
        name: &str,
        definition: &serde_json::Value,
        owner_id: Option<i64>,
    ) -> Result<Dashboard>;
}

pub struct SqlxAnalyticsRepository {
    pool: DynDatabasePool,
}

impl SqlxAnalyticsRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AnalyticsRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AnalyticsRepository for SqlxAnalyticsRepository {
    async fn insert_event(&self, event: &NewAnalyticsEvent) -> Result<AnalyticsEvent> {
        let result = sqlx::query(
            r#"
            INSERT INTO analytics_events (user_id, session_id, event_type, payload, occurred_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.user_id)
        .bind(&event.session_id)
        .bind(&event.event_type)
        .bind(event.payload.as_ref().map(|p| p.to_string()))
        .bind(event.occurred_at)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to record analytics event")?;

        Ok(AnalyticsEvent {
            id: result.last_insert_rowid(),
            user_id: event.user_id,
            session_id: event.session_id.clone(),
            event_type: event.event_type.clone(),
            payload: event.payload.clone(),
            occurred_at: event.occurred_at,
        })
    }

    async fn recent_events(&self, limit: i64) -> Result<Vec<AnalyticsEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, session_id, event_type, payload, occurred_at
            FROM analytics_events
            ORDER BY occurred_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to list analytics events")?;
        rows.iter().map(row_to_event).collect()
    }

    async fn count_by_type(&self) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query(
            "SELECT event_type, COUNT(*) AS total FROM analytics_events GROUP BY event_type ORDER BY event_type",
        )
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to summarise analytics events")?;

        Ok(rows
            .iter()
            .map(|row| (row.get("event_type"), row.get("total")))
            .collect())
    }

    async fn list_dashboards(&self) -> Result<Vec<Dashboard>> {
        let rows = sqlx::query(
            "SELECT id, name, definition, owner_id, created_at, updated_at FROM dashboards ORDER BY name",
        )
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to list dashboards")?;
        rows.iter().map(row_to_dashboard).collect()
    }

    async fn create_dashboard(
        &self,
        name: &str,
        definition: &serde_json::Value,
        owner_id: Option<i64>,
    ) -> Result<Dashboard> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO dashboards (name, definition, owner_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(definition.to_string())
        .bind(owner_id)
        .bind(now)
        .bind(now)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to create dashboard")?;

        Ok(Dashboard {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            definition: definition.clone(),
            owner_id,
            created_at: now,
            updated_at: now,
        })
    }
}

fn row_to_event(row: &SqliteRow) -> Result<AnalyticsEvent> {
    let payload: Option<String> = row.get("payload");
    let payload = payload
        .map(|p| serde_json::from_str(&p))
        .transpose()
        .context("Invalid event payload in database")?;

    Ok(AnalyticsEvent {
        id: row.get("id"),
        user_id: row.get("user_id"),
        session_id: row.get("session_id"),
        event_type: row.get("event_type"),
        payload,
        occurred_at: row.get("occurred_at"),
    })
}

fn row_to_dashboard(row: &SqliteRow) -> Result<Dashboard> {
    let definition: String = row.get("definition");
    Ok(Dashboard {
        id: row.get("id"),
        name: row.get("name"),
        definition: serde_json::from_str(&definition).context("Invalid dashboard definition")?,
        owner_id: row.get("owner_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, is_unique_violation, migrations};
    use chrono::Duration;

    async fn setup_test_repo() -> SqlxAnalyticsRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxAnalyticsRepository::new(pool)
    }

    fn event(event_type: &str, minutes_ago: i64) -> NewAnalyticsEvent {
        NewAnalyticsEvent {
            user_id: None,
            session_id: Some("s1".to_string()),
            event_type: event_type.to_string(),
            payload: Some(serde_json::json!({"path": "/"})),
            occurred_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn test_events_and_counts() {
        let repo = setup_test_repo().await;
        repo.insert_event(&event("page_view", 3)).await.unwrap();
        repo.insert_event(&event("page_view", 2)).await.unwrap();
        let latest = repo.insert_event(&event("click", 1)).await.unwrap();

        let counts = repo.count_by_type().await.unwrap();
        assert_eq!(
            counts,
            vec![("click".to_string(), 1), ("page_view".to_string(), 2)]
        );

        let recent = repo.recent_events(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, latest.id);
        assert_eq!(recent[0].payload.as_ref().unwrap()["path"], "/");
    }

    #[tokio::test]
    async fn test_dashboards() {
        let repo = setup_test_repo().await;
        let definition = serde_json::json!({"widgets": ["views"]});

        let created = repo.create_dashboard("Traffic", &definition, None).await.unwrap();
        assert_eq!(created.definition, definition);

        let err = repo.create_dashboard("Traffic", &definition, None).await.unwrap_err();
        assert!(is_unique_violation(&err));

        let all = repo.list_dashboards().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].definition["widgets"][0], "views");
    }
}
