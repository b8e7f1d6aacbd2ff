//! Content repository
//!
//! Database operations for content items, their version history and their
//! category and media links.
//!
//! Versions are append-only: `append_version` computes the next number inside
//! the INSERT so concurrent edits can never reuse a version number (the
//! `UNIQUE(content_id, version_number)` constraint backs this up).

use crate::db::DynDatabasePool;
use crate::models::{
    Category, ContentFilter, ContentItem, ContentMediaLink, ContentVersion, CreateContentInput,
    ListParams, UpdateContentInput, WorkflowState,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use std::sync::Arc;

/// Content repository trait
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Create an item together with version 1 and its links
    async fn create(&self, input: &CreateContentInput) -> Result<ContentItem>;

    async fn get_by_id(&self, id: i64) -> Result<Option<ContentItem>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<ContentItem>>;

    /// Paginated listing, newest first
    async fn list(&self, filter: &ContentFilter, params: &ListParams) -> Result<(Vec<ContentItem>, i64)>;

    /// Update metadata and links; returns `None` when the item doesn't exist
    async fn update(&self, id: i64, input: &UpdateContentInput) -> Result<Option<ContentItem>>;

    /// Move the item to `state`, mirroring it into `status`.
    /// `published_at` is only written when `Some`.
    async fn set_workflow_state(
        &self,
        id: i64,
        state: WorkflowState,
        published_at: Option<DateTime<Utc>>,
        updated_by: Option<i64>,
    ) -> Result<Option<ContentItem>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Append the next version of the body
    async fn append_version(
        &self,
        content_id: i64,
        body: &str,
        diff: Option<&serde_json::Value>,
    ) -> Result<ContentVersion>;

    async fn latest_version(&self, content_id: i64) -> Result<Option<ContentVersion>>;

    /// All versions, ascending
    async fn list_versions(&self, content_id: i64) -> Result<Vec<ContentVersion>>;

    async fn categories_for(&self, content_id: i64) -> Result<Vec<Category>>;

    async fn media_for(&self, content_id: i64) -> Result<Vec<ContentMediaLink>>;

    /// Published items whose title contains `query` (case-insensitive)
    async fn search_published_by_title(&self, query: &str, limit: i64) -> Result<Vec<ContentItem>>;

    /// Published items among `ids`, in the order given
    async fn get_published_by_ids(&self, ids: &[i64]) -> Result<Vec<ContentItem>>;
}

/// SQLx-based content repository implementation
pub struct SqlxContentRepository {
    pool: DynDatabasePool,
}

impl SqlxContentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ContentRepository> {
        Arc::new(Self::new(pool))
    }
}

const CONTENT_COLUMNS: &str = r#"
    id, type, title, slug, status, workflow_state, published_at, created_by, updated_by,
    created_at, updated_at
"#;

#[async_trait]
impl ContentRepository for SqlxContentRepository {
    async fn create(&self, input: &CreateContentInput) -> Result<ContentItem> {
        create_content(self.pool.sqlite(), input).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ContentItem>> {
        let sql = format!("SELECT {} FROM content_items WHERE id = ?", CONTENT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get content by ID")?;
        row.as_ref().map(row_to_content).transpose()
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<ContentItem>> {
        let sql = format!("SELECT {} FROM content_items WHERE slug = ?", CONTENT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(slug)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get content by slug")?;
        row.as_ref().map(row_to_content).transpose()
    }

    async fn list(&self, filter: &ContentFilter, params: &ListParams) -> Result<(Vec<ContentItem>, i64)> {
        list_content(self.pool.sqlite(), filter, params).await
    }

    async fn update(&self, id: i64, input: &UpdateContentInput) -> Result<Option<ContentItem>> {
        let found = update_content(self.pool.sqlite(), id, input).await?;
        if !found {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn set_workflow_state(
        &self,
        id: i64,
        state: WorkflowState,
        published_at: Option<DateTime<Utc>>,
        updated_by: Option<i64>,
    ) -> Result<Option<ContentItem>> {
        let result = sqlx::query(
            r#"
            UPDATE content_items
            SET workflow_state = ?, status = ?, published_at = COALESCE(?, published_at),
                updated_by = COALESCE(?, updated_by), updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(state.as_str())
        .bind(state.as_str())
        .bind(published_at)
        .bind(updated_by)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to update workflow state")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM content_items WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete content")?;
        Ok(result.rows_affected() > 0)
    }

    async fn append_version(
        &self,
        content_id: i64,
        body: &str,
        diff: Option<&serde_json::Value>,
    ) -> Result<ContentVersion> {
        let mut tx = self.pool.sqlite().begin().await.context("Failed to start transaction")?;
        let version = insert_next_version(&mut tx, content_id, body, diff).await?;
        sqlx::query("UPDATE content_items SET updated_at = ? WHERE id = ?")
            .bind(version.created_at)
            .bind(content_id)
            .execute(&mut *tx)
            .await
            .context("Failed to touch content")?;
        tx.commit().await.context("Failed to commit version")?;
        Ok(version)
    }

    async fn latest_version(&self, content_id: i64) -> Result<Option<ContentVersion>> {
        let row = sqlx::query(
            r#"
            SELECT id, content_id, version_number, body, diff, created_at
            FROM content_versions
            WHERE content_id = ?
            ORDER BY version_number DESC
            LIMIT 1
            "#,
        )
        .bind(content_id)
        .fetch_optional(self.pool.sqlite())
        .await
        .context("Failed to get latest version")?;
        row.as_ref().map(row_to_version).transpose()
    }

    async fn list_versions(&self, content_id: i64) -> Result<Vec<ContentVersion>> {
        let rows = sqlx::query(
            r#"
            SELECT id, content_id, version_number, body, diff, created_at
            FROM content_versions
            WHERE content_id = ?
            ORDER BY version_number ASC
            "#,
        )
        .bind(content_id)
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to list versions")?;
        rows.iter().map(row_to_version).collect()
    }

    async fn categories_for(&self, content_id: i64) -> Result<Vec<Category>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.name, c.slug, c.parent_id
            FROM content_categories c
            INNER JOIN content_category_links l ON l.category_id = c.id
            WHERE l.content_id = ?
            ORDER BY c.name
            "#,
        )
        .bind(content_id)
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to load content categories")?;

        Ok(rows
            .iter()
            .map(|row| Category {
                id: row.get("id"),
                name: row.get("name"),
                slug: row.get("slug"),
                parent_id: row.get("parent_id"),
            })
            .collect())
    }

    async fn media_for(&self, content_id: i64) -> Result<Vec<ContentMediaLink>> {
        let rows = sqlx::query("SELECT media_id, role FROM content_media WHERE content_id = ? ORDER BY id")
            .bind(content_id)
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to load content media")?;

        Ok(rows
            .iter()
            .map(|row| ContentMediaLink {
                media_id: row.get("media_id"),
                role: row.get("role"),
            })
            .collect())
    }

    async fn search_published_by_title(&self, query: &str, limit: i64) -> Result<Vec<ContentItem>> {
        let sql = format!(
            r#"
            SELECT {} FROM content_items
            WHERE workflow_state = 'published' AND title LIKE ? ESCAPE '\'
            ORDER BY published_at DESC, id DESC
            LIMIT ?
            "#,
            CONTENT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(format!("%{}%", escape_like(query)))
            .bind(limit)
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to search content")?;
        rows.iter().map(row_to_content).collect()
    }

    async fn get_published_by_ids(&self, ids: &[i64]) -> Result<Vec<ContentItem>> {
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(item) = self.get_by_id(*id).await? {
                if item.is_published() {
                    items.push(item);
                }
            }
        }
        Ok(items)
    }
}

async fn create_content(pool: &SqlitePool, input: &CreateContentInput) -> Result<ContentItem> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to start transaction")?;

    let result = sqlx::query(
        r#"
        INSERT INTO content_items (type, title, slug, status, workflow_state, created_by, updated_by,
                                   created_at, updated_at)
        VALUES (?, ?, ?, 'draft', 'draft', ?, ?, ?, ?)
        "#,
    )
    .bind(&input.content_type)
    .bind(&input.title)
    .bind(&input.slug)
    .bind(input.created_by)
    .bind(input.created_by)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create content")?;

    let id = result.last_insert_rowid();

    insert_next_version(&mut tx, id, &input.body, None).await?;
    replace_categories(&mut tx, id, &input.category_ids).await?;
    replace_media(&mut tx, id, &input.media).await?;

    tx.commit().await.context("Failed to commit content")?;

    Ok(ContentItem {
        id,
        content_type: input.content_type.clone(),
        title: input.title.clone(),
        slug: input.slug.clone(),
        status: WorkflowState::Draft.to_string(),
        workflow_state: WorkflowState::Draft,
        published_at: None,
        created_by: input.created_by,
        updated_by: input.created_by,
        created_at: now,
        updated_at: now,
    })
}

/// Returns false when the item doesn't exist
async fn update_content(pool: &SqlitePool, id: i64, input: &UpdateContentInput) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to start transaction")?;

    let result = sqlx::query(
        r#"
        UPDATE content_items
        SET title = COALESCE(?, title),
            slug = COALESCE(?, slug),
            type = COALESCE(?, type),
            updated_by = COALESCE(?, updated_by),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&input.title)
    .bind(&input.slug)
    .bind(&input.content_type)
    .bind(input.updated_by)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *tx)
    .await
    .context("Failed to update content")?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }

    if let Some(category_ids) = &input.category_ids {
        replace_categories(&mut tx, id, category_ids).await?;
    }
    if let Some(media) = &input.media {
        replace_media(&mut tx, id, media).await?;
    }

    tx.commit().await.context("Failed to commit content update")?;
    Ok(true)
}

async fn insert_next_version(
    tx: &mut Transaction<'_, Sqlite>,
    content_id: i64,
    body: &str,
    diff: Option<&serde_json::Value>,
) -> Result<ContentVersion> {
    let now = Utc::now();
    let diff_text = diff.map(|d| d.to_string());

    let result = sqlx::query(
        r#"
        INSERT INTO content_versions (content_id, version_number, body, diff, created_at)
        SELECT ?, COALESCE(MAX(version_number), 0) + 1, ?, ?, ?
        FROM content_versions WHERE content_id = ?
        "#,
    )
    .bind(content_id)
    .bind(body)
    .bind(&diff_text)
    .bind(now)
    .bind(content_id)
    .execute(&mut **tx)
    .await
    .context("Failed to append content version")?;

    let id = result.last_insert_rowid();
    let version_number: i64 = sqlx::query_scalar("SELECT version_number FROM content_versions WHERE id = ?")
        .bind(id)
        .fetch_one(&mut **tx)
        .await
        .context("Failed to read version number")?;

    Ok(ContentVersion {
        id,
        content_id,
        version_number,
        body: body.to_string(),
        diff: diff.cloned(),
        created_at: now,
    })
}

/// Replace category links; unknown category ids are skipped
async fn replace_categories(
    tx: &mut Transaction<'_, Sqlite>,
    content_id: i64,
    category_ids: &[i64],
) -> Result<()> {
    sqlx::query("DELETE FROM content_category_links WHERE content_id = ?")
        .bind(content_id)
        .execute(&mut **tx)
        .await
        .context("Failed to clear categories")?;

    for category_id in category_ids {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO content_category_links (content_id, category_id)
            SELECT ?, id FROM content_categories WHERE id = ?
            "#,
        )
        .bind(content_id)
        .bind(category_id)
        .execute(&mut **tx)
        .await
        .context("Failed to link category")?;
    }
    Ok(())
}

/// Replace media links; unknown media ids are skipped
async fn replace_media(
    tx: &mut Transaction<'_, Sqlite>,
    content_id: i64,
    media: &[ContentMediaLink],
) -> Result<()> {
    sqlx::query("DELETE FROM content_media WHERE content_id = ?")
        .bind(content_id)
        .execute(&mut **tx)
        .await
        .context("Failed to clear media links")?;

    for link in media {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO content_media (content_id, media_id, role)
            SELECT ?, id, ? FROM media_assets WHERE id = ?
            "#,
        )
        .bind(content_id)
        .bind(&link.role)
        .bind(link.media_id)
        .execute(&mut **tx)
        .await
        .context("Failed to link media")?;
    }
    Ok(())
}

async fn list_content(
    pool: &SqlitePool,
    filter: &ContentFilter,
    params: &ListParams,
) -> Result<(Vec<ContentItem>, i64)> {
    let mut conditions: Vec<&str> = Vec::new();
    let mut binds: Vec<&'static str> = Vec::new();

    if filter.published_only {
        conditions.push("workflow_state = ?");
        binds.push(WorkflowState::Published.as_str());
    }
    if let Some(state) = filter.workflow_state {
        conditions.push("workflow_state = ?");
        binds.push(state.as_str());
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM content_items {}", where_clause);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for value in &binds {
        count_query = count_query.bind(*value);
    }
    let total = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count content")?;

    let list_sql = format!(
        "SELECT {} FROM content_items {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        CONTENT_COLUMNS, where_clause
    );
    let mut list_query = sqlx::query(&list_sql);
    for value in &binds {
        list_query = list_query.bind(*value);
    }
    let rows = list_query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list content")?;

    let items = rows.iter().map(row_to_content).collect::<Result<Vec<_>>>()?;
    Ok((items, total))
}

fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn row_to_content(row: &SqliteRow) -> Result<ContentItem> {
    let state_str: String = row.get("workflow_state");
    let workflow_state = WorkflowState::from_str(&state_str)
        .with_context(|| format!("Invalid workflow state in database: {}", state_str))?;

    Ok(ContentItem {
        id: row.get("id"),
        content_type: row.get("type"),
        title: row.get("title"),
        slug: row.get("slug"),
        status: row.get("status"),
        workflow_state,
        published_at: row.get("published_at"),
        created_by: row.get("created_by"),
        updated_by: row.get("updated_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_version(row: &SqliteRow) -> Result<ContentVersion> {
    let diff: Option<String> = row.get("diff");
    let diff = diff
        .map(|d| serde_json::from_str(&d))
        .transpose()
        .context("Invalid version diff in database")?;

    Ok(ContentVersion {
        id: row.get("id"),
        content_id: row.get("content_id"),
        version_number: row.get("version_number"),
        body: row.get("body"),
        diff,
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, is_unique_violation, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxContentRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxContentRepository::new(pool.clone());
        (pool, repo)
    }

    fn input(slug: &str) -> CreateContentInput {
        CreateContentInput {
            content_type: "article".to_string(),
            title: format!("Title {}", slug),
            slug: slug.to_string(),
            body: "First body".to_string(),
            category_ids: vec![],
            media: vec![],
            created_by: None,
        }
    }

    #[tokio::test]
    async fn test_create_starts_as_draft_with_version_one() {
        let (_pool, repo) = setup_test_repo().await;

        let item = repo.create(&input("hello")).await.unwrap();
        assert_eq!(item.workflow_state, WorkflowState::Draft);
        assert_eq!(item.status, "draft");

        let latest = repo.latest_version(item.id).await.unwrap().unwrap();
        assert_eq!(latest.version_number, 1);
        assert_eq!(latest.body, "First body");
    }

    #[tokio::test]
    async fn test_duplicate_slug() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&input("same")).await.unwrap();
        let err = repo.create(&input("same")).await.unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_append_versions_increment() {
        let (_pool, repo) = setup_test_repo().await;
        let item = repo.create(&input("versions")).await.unwrap();

        let diff = serde_json::json!({"changed": "body"});
        let v2 = repo.append_version(item.id, "Second", Some(&diff)).await.unwrap();
        let v3 = repo.append_version(item.id, "Third", None).await.unwrap();
        assert_eq!(v2.version_number, 2);
        assert_eq!(v3.version_number, 3);

        let versions = repo.list_versions(item.id).await.unwrap();
        let numbers: Vec<i64> = versions.iter().map(|v| v.version_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(versions[1].diff, Some(diff));
    }

    #[tokio::test]
    async fn test_workflow_state_mirrors_status() {
        let (_pool, repo) = setup_test_repo().await;
        let item = repo.create(&input("flow")).await.unwrap();

        let now = Utc::now();
        let published = repo
            .set_workflow_state(item.id, WorkflowState::Published, Some(now), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(published.status, "published");
        assert!(published.published_at.is_some());

        let archived = repo
            .set_workflow_state(item.id, WorkflowState::Archived, None, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(archived.status, "archived");
        assert!(archived.published_at.is_some());

        assert!(repo
            .set_workflow_state(999, WorkflowState::Review, None, None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates() {
        let (_pool, repo) = setup_test_repo().await;
        for i in 0..5 {
            repo.create(&input(&format!("item-{}", i))).await.unwrap();
        }
        let first = repo.get_by_slug("item-0").await.unwrap().unwrap();
        repo.set_workflow_state(first.id, WorkflowState::Published, Some(Utc::now()), None)
            .await
            .unwrap();

        let (items, total) = repo
            .list(&ContentFilter::default(), &ListParams::new(1, 2))
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(items.len(), 2);

        let public = ContentFilter {
            published_only: true,
            ..ContentFilter::default()
        };
        let (items, total) = repo.list(&public, &ListParams::new(1, 10)).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].slug, "item-0");

        let drafts = ContentFilter {
            workflow_state: Some(WorkflowState::Draft),
            ..ContentFilter::default()
        };
        let (_, total) = repo.list(&drafts, &ListParams::new(1, 10)).await.unwrap();
        assert_eq!(total, 4);
    }

    #[tokio::test]
    async fn test_update_replaces_links() {
        let (pool, repo) = setup_test_repo().await;
        let sqlite = pool.sqlite();
        sqlx::query("INSERT INTO content_categories (name, slug) VALUES ('News', 'news'), ('Tech', 'tech')")
            .execute(sqlite)
            .await
            .unwrap();
        sqlx::query("INSERT INTO media_assets (type, filename, storage_url) VALUES ('image', 'a.png', '/uploads/a.png')")
            .execute(sqlite)
            .await
            .unwrap();

        let mut create = input("linked");
        create.category_ids = vec![1, 42];
        create.media = vec![ContentMediaLink { media_id: 1, role: "hero".to_string() }];
        let item = repo.create(&create).await.unwrap();

        assert_eq!(repo.categories_for(item.id).await.unwrap().len(), 1);
        assert_eq!(repo.media_for(item.id).await.unwrap()[0].role, "hero");

        let updated = repo
            .update(
                item.id,
                &UpdateContentInput {
                    title: Some("New title".to_string()),
                    category_ids: Some(vec![2]),
                    media: Some(vec![]),
                    ..UpdateContentInput::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.title, "New title");
        assert_eq!(updated.slug, "linked");
        let categories = repo.categories_for(item.id).await.unwrap();
        assert_eq!(categories[0].slug, "tech");
        assert!(repo.media_for(item.id).await.unwrap().is_empty());
        assert!(repo.update(999, &UpdateContentInput::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_published_by_title() {
        let (_pool, repo) = setup_test_repo().await;
        let a = repo.create(&input("rust-news")).await.unwrap();
        repo.create(&input("rust-draft")).await.unwrap();
        repo.set_workflow_state(a.id, WorkflowState::Published, Some(Utc::now()), None)
            .await
            .unwrap();

        let hits = repo.search_published_by_title("RUST", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, a.id);

        assert!(repo.search_published_by_title("%", 10).await.unwrap().is_empty());

        let by_ids = repo.get_published_by_ids(&[a.id + 1, a.id]).await.unwrap();
        assert_eq!(by_ids.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let (_pool, repo) = setup_test_repo().await;
        let item = repo.create(&input("gone")).await.unwrap();

        assert!(repo.delete(item.id).await.unwrap());
        assert!(repo.get_by_id(item.id).await.unwrap().is_none());
        assert!(repo.list_versions(item.id).await.unwrap().is_empty());
        assert!(!repo.delete(item.id).await.unwrap());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%_done\\"), "100\\%\\_done\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
