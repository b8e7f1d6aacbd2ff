//! Newsletter subscription repository

use crate::db::DynDatabasePool;
use crate::models::NewsletterSubscription;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait NewsletterRepository: Send + Sync {
    async fn get_by_email(&self, email: &str) -> Result<Option<NewsletterSubscription>>;

    async fn create(&self, email: &str, source: Option<&str>) -> Result<NewsletterSubscription>;

    /// Flip the active flag, returning the updated row
    async fn set_active(&self, id: i64, active: bool) -> Result<Option<NewsletterSubscription>>;

    /// All subscriptions, newest first
    async fn list(&self) -> Result<Vec<NewsletterSubscription>>;
}

pub struct SqlxNewsletterRepository {
    pool: DynDatabasePool,
}

impl SqlxNewsletterRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NewsletterRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl NewsletterRepository for SqlxNewsletterRepository {
    async fn get_by_email(&self, email: &str) -> Result<Option<NewsletterSubscription>> {
        let row = sqlx::query(
            "SELECT id, email, is_active, source, created_at FROM newsletter_subscriptions WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(self.pool.sqlite())
        .await
        .context("Failed to get subscription")?;
        Ok(row.as_ref().map(row_to_subscription))
    }

    async fn create(&self, email: &str, source: Option<&str>) -> Result<NewsletterSubscription> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO newsletter_subscriptions (email, is_active, source, created_at) VALUES (?, 1, ?, ?)",
        )
        .bind(email)
        .bind(source)
        .bind(now)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to create subscription")?;

        Ok(NewsletterSubscription {
            id: result.last_insert_rowid(),
            email: email.to_string(),
            is_active: true,
            source: source.map(str::to_string),
            created_at: now,
        })
    }

    async fn set_active(&self, id: i64, active: bool) -> Result<Option<NewsletterSubscription>> {
        sqlx::query("UPDATE newsletter_subscriptions SET is_active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to update subscription")?;

        let row = sqlx::query(
            "SELECT id, email, is_active, source, created_at FROM newsletter_subscriptions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool.sqlite())
        .await
        .context("Failed to reload subscription")?;
        Ok(row.as_ref().map(row_to_subscription))
    }

    async fn list(&self) -> Result<Vec<NewsletterSubscription>> {
        let rows = sqlx::query(
            "SELECT id, email, is_active, source, created_at FROM newsletter_subscriptions ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to list subscriptions")?;
        Ok(rows.iter().map(row_to_subscription).collect())
    }
}

fn row_to_subscription(row: &SqliteRow) -> NewsletterSubscription {
    NewsletterSubscription {
        id: row.get("id"),
        email: row.get("email"),
        is_active: row.get("is_active"),
        source: row.get("source"),
        created_at: row.get("created_at"),
    }
}
