//! Content category repository

use crate::db::DynDatabasePool;
use crate::models::{Category, CreateCategoryInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Category>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    async fn create(&self, input: &CreateCategoryInput) -> Result<Category>;
}

pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn list(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name, slug, parent_id FROM content_categories ORDER BY name")
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list categories")?;
        Ok(rows.iter().map(row_to_category).collect())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        let row = sqlx::query("SELECT id, name, slug, parent_id FROM content_categories WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get category")?;
        Ok(row.as_ref().map(row_to_category))
    }

    async fn create(&self, input: &CreateCategoryInput) -> Result<Category> {
        let result = sqlx::query("INSERT INTO content_categories (name, slug, parent_id) VALUES (?, ?, ?)")
            .bind(&input.name)
            .bind(&input.slug)
            .bind(input.parent_id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to create category")?;

        Ok(Category {
            id: result.last_insert_rowid(),
            name: input.name.clone(),
            slug: input.slug.clone(),
            parent_id: input.parent_id,
        })
    }
}

fn row_to_category(row: &sqlx::sqlite::SqliteRow) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        parent_id: row.get("parent_id"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, is_unique_violation, migrations};

    async fn setup_test_repo() -> SqlxCategoryRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxCategoryRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_list_categories() {
        let repo = setup_test_repo().await;

        let parent = repo
            .create(&CreateCategoryInput {
                name: "News".to_string(),
                slug: "news".to_string(),
                parent_id: None,
            })
            .await
            .unwrap();
        let child = repo
            .create(&CreateCategoryInput {
                name: "Local".to_string(),
                slug: "local".to_string(),
                parent_id: Some(parent.id),
            })
            .await
            .unwrap();

        assert_eq!(child.parent_id, Some(parent.id));
        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "Local");
        assert_eq!(repo.get_by_id(parent.id).await.unwrap(), Some(parent));
    }

    #[tokio::test]
    async fn test_duplicate_category_slug() {
        let repo = setup_test_repo().await;
        let input = CreateCategoryInput {
            name: "News".to_string(),
            slug: "news".to_string(),
            parent_id: None,
        };
        repo.create(&input).await.unwrap();
        let err = repo.create(&input).await.unwrap_err();
        assert!(is_unique_violation(&err));
    }
}
