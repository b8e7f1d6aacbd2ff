//! Webhook repository

use crate::db::DynDatabasePool;
use crate::models::{CreateWebhookInput, Webhook, WebhookStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait WebhookRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Webhook>>;

    async fn list_active(&self) -> Result<Vec<Webhook>>;

    async fn create(&self, input: &CreateWebhookInput) -> Result<Webhook>;

    async fn set_status(&self, id: i64, status: WebhookStatus) -> Result<Option<Webhook>>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxWebhookRepository {
    pool: DynDatabasePool,
}

impl SqlxWebhookRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn WebhookRepository> {
        Arc::new(Self::new(pool))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Webhook>> {
        let row = sqlx::query(
            "SELECT id, name, target_url, secret, status, created_at, updated_at FROM webhooks WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool.sqlite())
        .await
        .context("Failed to get webhook")?;
        row.as_ref().map(row_to_webhook).transpose()
    }
}

#[async_trait]
impl WebhookRepository for SqlxWebhookRepository {
    async fn list(&self) -> Result<Vec<Webhook>> {
        let rows = sqlx::query(
            "SELECT id, name, target_url, secret, status, created_at, updated_at FROM webhooks ORDER BY id",
        )
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to list webhooks")?;
        rows.iter().map(row_to_webhook).collect()
    }

    async fn list_active(&self) -> Result<Vec<Webhook>> {
        let rows = sqlx::query(
            "SELECT id, name, target_url, secret, status, created_at, updated_at FROM webhooks WHERE status = 'active' ORDER BY id",
        )
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to list active webhooks")?;
        rows.iter().map(row_to_webhook).collect()
    }

    async fn create(&self, input: &CreateWebhookInput) -> Result<Webhook> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO webhooks (name, target_url, secret, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&input.name)
        .bind(&input.target_url)
        .bind(&input.secret)
        .bind(input.status.to_string())
        .bind(now)
        .bind(now)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to create webhook")?;

        Ok(Webhook {
            id: result.last_insert_rowid(),
            name: input.name.clone(),
            target_url: input.target_url.clone(),
            secret: input.secret.clone(),
            status: input.status,
            created_at: now,
            updated_at: now,
        })
    }

    async fn set_status(&self, id: i64, status: WebhookStatus) -> Result<Option<Webhook>> {
        let result = sqlx::query("UPDATE webhooks SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to update webhook")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM webhooks WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete webhook")?;
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_webhook(row: &SqliteRow) -> Result<Webhook> {
    let status_str: String = row.get("status");
    let status = WebhookStatus::from_str(&status_str)
        .with_context(|| format!("Invalid webhook status in database: {}", status_str))?;

    Ok(Webhook {
        id: row.get("id"),
        name: row.get("name"),
        target_url: row.get("target_url"),
        secret: row.get("secret"),
        status,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
