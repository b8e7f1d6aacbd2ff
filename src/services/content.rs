//! Content service
//!
//! Implements content management on top of the content repository:
//! - CRUD with slug generation and validation
//! - Append-only body versions (a new version only when the body changes)
//! - The editorial workflow and its side effects
//! - Category management
//! - Search over published content
//!
//! Workflow side effects:
//! - entering `published` stamps `published_at`, indexes the item, refreshes
//!   its SEO metadata and notifies webhooks with `content.published`
//! - entering `archived` removes it from the index and notifies webhooks with
//!   `content.archived`
//! - every transition and delete invalidates the cached sitemap
//!
//! Side effects after the state change are best-effort: failures are logged
//! and never undo the transition.

use crate::db::repositories::{CategoryRepository, ContentRepository};
use crate::db::{is_foreign_key_violation, is_unique_violation};
use crate::models::{
    Category, ContentFilter, ContentItem, ContentMediaLink, ContentVersion, CreateCategoryInput,
    CreateContentInput, ListParams, PagedResult, UpdateContentInput, User, WorkflowState,
};
use crate::services::audit;
use crate::services::notification::{
    NotificationService, EVENT_CONTENT_ARCHIVED, EVENT_CONTENT_PUBLISHED,
};
use crate::services::search::{SearchBackend, SearchDocument};
use crate::services::seo::SeoService;
use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

const DEFAULT_CONTENT_TYPE: &str = "article";
const MAX_SLUG_LENGTH: usize = 255;
const MAX_TITLE_LENGTH: usize = 255;
const SEARCH_LIMIT: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum ContentServiceError {
    #[error("Content not found")]
    NotFound,

    #[error("Category not found")]
    CategoryNotFound,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Slug '{0}' already exists")]
    SlugExists(String),

    #[error("Invalid workflow transition")]
    InvalidTransition { from: WorkflowState, to: WorkflowState },

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Content item with its latest body and links
#[derive(Debug, Clone, Serialize)]
pub struct ContentDetail {
    #[serde(flatten)]
    pub item: ContentItem,
    pub body: Option<String>,
    pub version: Option<i64>,
    pub categories: Vec<Category>,
    pub media: Vec<ContentMediaLink>,
}

/// Input for creating content
#[derive(Debug, Clone, Default)]
pub struct NewContent {
    pub content_type: Option<String>,
    pub title: String,
    pub slug: Option<String>,
    pub body: String,
    pub category_ids: Vec<i64>,
    pub media: Vec<ContentMediaLink>,
}

/// Partial content update
#[derive(Debug, Clone, Default)]
pub struct ContentChanges {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content_type: Option<String>,
    pub body: Option<String>,
    pub diff: Option<serde_json::Value>,
    pub category_ids: Option<Vec<i64>>,
    pub media: Option<Vec<ContentMediaLink>>,
}

/// Generate a URL-friendly slug from a title.
///
/// ASCII letters and digits are kept (lowercased), everything else becomes
/// a single hyphen, and leading/trailing hyphens are dropped.
pub fn generate_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug.truncate(MAX_SLUG_LENGTH);
    slug.trim_end_matches('-').to_string()
}

/// Lowercase ASCII letters, digits and hyphens only
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= MAX_SLUG_LENGTH
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

fn resolve_slug(explicit: Option<&str>, title: &str) -> Result<String, ContentServiceError> {
    let slug = match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => slug.to_string(),
        None => {
            let generated = generate_slug(title);
            if generated.is_empty() {
                // titles without ASCII letters or digits
                format!("content-{}", &uuid::Uuid::new_v4().simple().to_string()[..8])
            } else {
                generated
            }
        }
    };

    if !is_valid_slug(&slug) {
        return Err(ContentServiceError::ValidationError(
            "Slug may only contain lowercase letters, digits and hyphens".to_string(),
        ));
    }
    Ok(slug)
}

fn validate_title(title: &str) -> Result<String, ContentServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ContentServiceError::ValidationError(
            "Title cannot be empty".to_string(),
        ));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ContentServiceError::ValidationError(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(title.to_string())
}

pub struct ContentService {
    content_repo: Arc<dyn ContentRepository>,
    category_repo: Arc<dyn CategoryRepository>,
    search: Arc<dyn SearchBackend>,
    seo: Arc<SeoService>,
    notifications: Arc<NotificationService>,
}

impl ContentService {
    pub fn new(
        content_repo: Arc<dyn ContentRepository>,
        category_repo: Arc<dyn CategoryRepository>,
        search: Arc<dyn SearchBackend>,
        seo: Arc<SeoService>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            content_repo,
            category_repo,
            search,
            seo,
            notifications,
        }
    }

    /// Paginated listing; anonymous viewers only see published items
    pub async fn list(
        &self,
        viewer: Option<&User>,
        workflow_state: Option<WorkflowState>,
        params: ListParams,
    ) -> Result<PagedResult<ContentItem>, ContentServiceError> {
        let filter = ContentFilter {
            workflow_state,
            published_only: viewer.is_none(),
        };
        let (items, total) = self
            .content_repo
            .list(&filter, &params)
            .await
            .context("Failed to list content")?;
        Ok(PagedResult::new(items, total, &params))
    }

    pub async fn get(&self, viewer: Option<&User>, id: i64) -> Result<ContentDetail, ContentServiceError> {
        let item = self
            .content_repo
            .get_by_id(id)
            .await
            .context("Failed to get content")?;
        self.visible_detail(viewer, item).await
    }

    pub async fn get_by_slug(
        &self,
        viewer: Option<&User>,
        slug: &str,
    ) -> Result<ContentDetail, ContentServiceError> {
        let item = self
            .content_repo
            .get_by_slug(slug)
            .await
            .context("Failed to get content by slug")?;
        self.visible_detail(viewer, item).await
    }

    async fn visible_detail(
        &self,
        viewer: Option<&User>,
        item: Option<ContentItem>,
    ) -> Result<ContentDetail, ContentServiceError> {
        match item {
            Some(item) if viewer.is_some() || item.is_published() => self.detail(item).await,
            _ => Err(ContentServiceError::NotFound),
        }
    }

    async fn detail(&self, item: ContentItem) -> Result<ContentDetail, ContentServiceError> {
        let latest = self
            .content_repo
            .latest_version(item.id)
            .await
            .context("Failed to load latest version")?;
        let categories = self
            .content_repo
            .categories_for(item.id)
            .await
            .context("Failed to load categories")?;
        let media = self
            .content_repo
            .media_for(item.id)
            .await
            .context("Failed to load media links")?;

        Ok(ContentDetail {
            item,
            version: latest.as_ref().map(|v| v.version_number),
            body: latest.map(|v| v.body),
            categories,
            media,
        })
    }

    pub async fn create(&self, author: &User, input: NewContent) -> Result<ContentDetail, ContentServiceError> {
        let title = validate_title(&input.title)?;
        let slug = resolve_slug(input.slug.as_deref(), &title)?;
        let content_type = input
            .content_type
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let create = CreateContentInput {
            content_type,
            title,
            slug: slug.clone(),
            body: input.body,
            category_ids: input.category_ids,
            media: input.media,
            created_by: Some(author.id),
        };

        let item = self.content_repo.create(&create).await.map_err(|e| {
            if is_unique_violation(&e) {
                ContentServiceError::SlugExists(slug.clone())
            } else {
                ContentServiceError::InternalError(e.context("Failed to create content"))
            }
        })?;

        audit::record("content.created", Some(author.id), &format!("content:{}", item.id));
        self.detail(item).await
    }

    /// Update metadata and links, appending a version when the body changed.
    ///
    /// Authors may only edit their own items; editors and admins any.
    pub async fn update(
        &self,
        editor: &User,
        id: i64,
        changes: ContentChanges,
    ) -> Result<ContentDetail, ContentServiceError> {
        let existing = self
            .content_repo
            .get_by_id(id)
            .await
            .context("Failed to get content")?
            .ok_or(ContentServiceError::NotFound)?;

        if !editor.can_edit(existing.created_by) {
            return Err(ContentServiceError::Forbidden(
                "You can only edit your own content".to_string(),
            ));
        }

        let title = changes.title.as_deref().map(validate_title).transpose()?;
        let slug = match changes.slug.as_deref() {
            Some(slug) => Some(resolve_slug(Some(slug), title.as_deref().unwrap_or(&existing.title))?),
            None => None,
        };

        let update = UpdateContentInput {
            title,
            slug: slug.clone(),
            content_type: changes.content_type.filter(|t| !t.trim().is_empty()),
            category_ids: changes.category_ids,
            media: changes.media,
            updated_by: Some(editor.id),
        };

        let item = self
            .content_repo
            .update(id, &update)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ContentServiceError::SlugExists(slug.clone().unwrap_or_default())
                } else {
                    ContentServiceError::InternalError(e.context("Failed to update content"))
                }
            })?
            .ok_or(ContentServiceError::NotFound)?;

        if let Some(body) = changes.body {
            let latest = self
                .content_repo
                .latest_version(id)
                .await
                .context("Failed to load latest version")?;
            if latest.map(|v| v.body) != Some(body.clone()) {
                let version = self
                    .content_repo
                    .append_version(id, &body, changes.diff.as_ref())
                    .await
                    .context("Failed to append version")?;
                tracing::debug!(content_id = id, version = version.version_number, "Appended content version");
            }
        }

        audit::record("content.updated", Some(editor.id), &format!("content:{}", id));

        if item.is_published() {
            self.index(&item).await;
            self.seo.invalidate_sitemap().await;
        }
        self.detail(item).await
    }

    pub async fn versions(&self, id: i64) -> Result<Vec<ContentVersion>, ContentServiceError> {
        if self
            .content_repo
            .get_by_id(id)
            .await
            .context("Failed to get content")?
            .is_none()
        {
            return Err(ContentServiceError::NotFound);
        }
        Ok(self
            .content_repo
            .list_versions(id)
            .await
            .context("Failed to list versions")?)
    }

    /// Move an item to `target` if the workflow allows it
    pub async fn transition(
        &self,
        actor: &User,
        id: i64,
        target: WorkflowState,
    ) -> Result<ContentItem, ContentServiceError> {
        let existing = self
            .content_repo
            .get_by_id(id)
            .await
            .context("Failed to get content")?
            .ok_or(ContentServiceError::NotFound)?;

        let from = existing.workflow_state;
        if !from.can_transition_to(target) {
            return Err(ContentServiceError::InvalidTransition { from, to: target });
        }

        let published_at = (target == WorkflowState::Published).then(Utc::now);
        let item = self
            .content_repo
            .set_workflow_state(id, target, published_at, Some(actor.id))
            .await
            .context("Failed to update workflow state")?
            .ok_or(ContentServiceError::NotFound)?;

        tracing::info!(content_id = id, from = %from, to = %target, "Workflow transition");
        audit::record(
            &format!("content.{}", target),
            Some(actor.id),
            &format!("content:{}", id),
        );

        self.seo.invalidate_sitemap().await;
        match target {
            WorkflowState::Published => {
                self.index(&item).await;
                if let Err(e) = self.seo.recalculate_for(&item).await {
                    tracing::error!(content_id = id, error = ?e, "Failed to refresh SEO metadata");
                }
                self.notifications
                    .dispatch(EVENT_CONTENT_PUBLISHED, event_payload(&item))
                    .await;
            }
            WorkflowState::Archived => {
                self.unindex(id).await;
                self.notifications
                    .dispatch(EVENT_CONTENT_ARCHIVED, event_payload(&item))
                    .await;
            }
            WorkflowState::Draft | WorkflowState::Review => {}
        }

        Ok(item)
    }

    /// The review -> published transition
    pub async fn publish(&self, actor: &User, id: i64) -> Result<ContentItem, ContentServiceError> {
        self.transition(actor, id, WorkflowState::Published).await
    }

    pub async fn delete(&self, actor: &User, id: i64) -> Result<(), ContentServiceError> {
        if !self
            .content_repo
            .delete(id)
            .await
            .context("Failed to delete content")?
        {
            return Err(ContentServiceError::NotFound);
        }

        audit::record("content.deleted", Some(actor.id), &format!("content:{}", id));
        self.unindex(id).await;
        self.seo.invalidate_sitemap().await;
        Ok(())
    }

    /// Published items matching `query`.
    ///
    /// Uses the search backend when it returns hits, otherwise title
    /// matching in the database.
    pub async fn search(&self, query: &str) -> Result<Vec<ContentItem>, ContentServiceError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ContentServiceError::ValidationError(
                "Query cannot be empty".to_string(),
            ));
        }

        let ids = match self.search.search(query, SEARCH_LIMIT).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(error = ?e, "Search backend failed, falling back to title search");
                Vec::new()
            }
        };

        if !ids.is_empty() {
            let items = self
                .content_repo
                .get_published_by_ids(&ids)
                .await
                .context("Failed to load search hits")?;
            if !items.is_empty() {
                return Ok(items);
            }
        }

        Ok(self
            .content_repo
            .search_published_by_title(query, SEARCH_LIMIT as i64)
            .await
            .context("Failed to search content")?)
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, ContentServiceError> {
        Ok(self
            .category_repo
            .list()
            .await
            .context("Failed to list categories")?)
    }

    pub async fn create_category(
        &self,
        actor: &User,
        name: &str,
        slug: Option<&str>,
        parent_id: Option<i64>,
    ) -> Result<Category, ContentServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ContentServiceError::ValidationError(
                "Category name cannot be empty".to_string(),
            ));
        }
        let slug = resolve_slug(slug, name)?;

        if let Some(parent_id) = parent_id {
            if self
                .category_repo
                .get_by_id(parent_id)
                .await
                .context("Failed to load parent category")?
                .is_none()
            {
                return Err(ContentServiceError::CategoryNotFound);
            }
        }

        let input = CreateCategoryInput {
            name: name.to_string(),
            slug: slug.clone(),
            parent_id,
        };
        let category = self.category_repo.create(&input).await.map_err(|e| {
            if is_unique_violation(&e) {
                ContentServiceError::SlugExists(slug.clone())
            } else if is_foreign_key_violation(&e) {
                ContentServiceError::CategoryNotFound
            } else {
                ContentServiceError::InternalError(e.context("Failed to create category"))
            }
        })?;

        audit::record("category.created", Some(actor.id), &category.slug);
        Ok(category)
    }

    async fn index(&self, item: &ContentItem) {
        let body = match self.content_repo.latest_version(item.id).await {
            Ok(latest) => latest.map(|v| v.body),
            Err(e) => {
                tracing::error!(content_id = item.id, error = ?e, "Failed to load body for indexing");
                None
            }
        };
        if let Err(e) = self.search.index(&SearchDocument::from_item(item, body)).await {
            tracing::error!(content_id = item.id, error = ?e, "Failed to index content");
        }
    }

    async fn unindex(&self, id: i64) {
        if let Err(e) = self.search.remove(id).await {
            tracing::error!(content_id = id, error = ?e, "Failed to remove content from index");
        }
    }
}

fn event_payload(item: &ContentItem) -> serde_json::Value {
    json!({
        "id": item.id,
        "slug": item.slug,
        "title": item.title,
        "type": item.content_type,
        "workflow_state": item.workflow_state,
        "published_at": item.published_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{
        SqlxCategoryRepository, SqlxContentRepository, SqlxSeoRepository, SqlxUserRepository,
        SqlxWebhookRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{CreateUserInput, ROLE_AUTHOR, ROLE_EDITOR, ROLE_REVIEWER};
    use crate::services::search::testing::RecordingSearch;
    use proptest::prelude::*;

    struct Fixture {
        pool: DynDatabasePool,
        service: ContentService,
        search: Arc<RecordingSearch>,
        seo: Arc<SeoService>,
    }

    async fn setup_with_search(search: RecordingSearch) -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let content_repo = SqlxContentRepository::boxed(pool.clone());
        let search = Arc::new(search);
        let seo = Arc::new(SeoService::new(
            SqlxSeoRepository::boxed(pool.clone()),
            content_repo.clone(),
            Arc::new(MemoryCache::new()),
        ));
        let notifications = Arc::new(NotificationService::new(
            SqlxWebhookRepository::boxed(pool.clone()),
            None,
            2,
        ));
        let service = ContentService::new(
            content_repo,
            SqlxCategoryRepository::boxed(pool.clone()),
            search.clone(),
            seo.clone(),
            notifications,
        );
        Fixture {
            pool,
            service,
            search,
            seo,
        }
    }

    async fn setup_test_service() -> Fixture {
        setup_with_search(RecordingSearch::default()).await
    }

    async fn create_user(pool: &DynDatabasePool, email: &str, role: &str) -> User {
        let repo = SqlxUserRepository::new(pool.clone());
        let role_id = match role {
            "editor" => 2,
            "author" => 3,
            _ => 4,
        };
        let user = repo
            .create(&CreateUserInput {
                email: email.to_string(),
                hashed_password: "hash".to_string(),
                role_ids: vec![role_id],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(user.roles, vec![role.to_string()]);
        user
    }

    fn new_content(title: &str) -> NewContent {
        NewContent {
            title: title.to_string(),
            body: "First draft".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_generate_slug() {
        assert_eq!(generate_slug("Hello World"), "hello-world");
        assert_eq!(generate_slug("  Rust & Axum: 2024!  "), "rust-axum-2024");
        assert_eq!(generate_slug("already-a-slug"), "already-a-slug");
        assert_eq!(generate_slug("Café au lait"), "caf-au-lait");
        assert_eq!(generate_slug("日本語"), "");
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("hello-world-2"));
        assert!(!is_valid_slug("Hello"));
        assert!(!is_valid_slug("hello world"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug(&"a".repeat(256)));
    }

    #[tokio::test]
    async fn test_create_generates_slug_and_first_version() {
        let f = setup_test_service().await;
        let author = create_user(&f.pool, "author@example.com", ROLE_AUTHOR).await;

        let detail = f.service.create(&author, new_content("Hello World")).await.unwrap();
        assert_eq!(detail.item.slug, "hello-world");
        assert_eq!(detail.item.content_type, "article");
        assert_eq!(detail.item.workflow_state, WorkflowState::Draft);
        assert_eq!(detail.item.created_by, Some(author.id));
        assert_eq!(detail.version, Some(1));
        assert_eq!(detail.body.as_deref(), Some("First draft"));

        let result = f.service.create(&author, new_content("Hello, World!")).await;
        assert!(matches!(result, Err(ContentServiceError::SlugExists(_))));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let f = setup_test_service().await;
        let author = create_user(&f.pool, "author@example.com", ROLE_AUTHOR).await;

        let result = f.service.create(&author, new_content("   ")).await;
        assert!(matches!(result, Err(ContentServiceError::ValidationError(_))));

        let mut input = new_content("Title");
        input.slug = Some("Bad Slug".to_string());
        let result = f.service.create(&author, input).await;
        assert!(matches!(result, Err(ContentServiceError::ValidationError(_))));

        // non-ASCII titles still get a valid slug
        let detail = f.service.create(&author, new_content("日本語")).await.unwrap();
        assert!(detail.item.slug.starts_with("content-"));
    }

    #[tokio::test]
    async fn test_update_appends_versions_only_on_change() {
        let f = setup_test_service().await;
        let author = create_user(&f.pool, "author@example.com", ROLE_AUTHOR).await;
        let created = f.service.create(&author, new_content("Versioned")).await.unwrap();
        let id = created.item.id;

        let updated = f
            .service
            .update(
                &author,
                id,
                ContentChanges {
                    body: Some("Second draft".to_string()),
                    diff: Some(json!({"changed": "body"})),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.version, Some(2));

        let same = f
            .service
            .update(
                &author,
                id,
                ContentChanges {
                    body: Some("Second draft".to_string()),
                    title: Some("Versioned, renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(same.version, Some(2));
        assert_eq!(same.item.title, "Versioned, renamed");

        let versions = f.service.versions(id).await.unwrap();
        let numbers: Vec<i64> = versions.iter().map(|v| v.version_number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(versions[1].diff, Some(json!({"changed": "body"})));
    }

    #[tokio::test]
    async fn test_authors_edit_only_their_own_content() {
        let f = setup_test_service().await;
        let author = create_user(&f.pool, "author@example.com", ROLE_AUTHOR).await;
        let other = create_user(&f.pool, "other@example.com", ROLE_AUTHOR).await;
        let editor = create_user(&f.pool, "editor@example.com", ROLE_EDITOR).await;
        let created = f.service.create(&author, new_content("Mine")).await.unwrap();

        let change = ContentChanges {
            title: Some("Hijacked".to_string()),
            ..Default::default()
        };
        let result = f.service.update(&other, created.item.id, change.clone()).await;
        assert!(matches!(result, Err(ContentServiceError::Forbidden(_))));

        let updated = f.service.update(&editor, created.item.id, change).await.unwrap();
        assert_eq!(updated.item.updated_by, Some(editor.id));
    }

    #[tokio::test]
    async fn test_workflow_transitions_and_side_effects() {
        let f = setup_test_service().await;
        let author = create_user(&f.pool, "author@example.com", ROLE_AUTHOR).await;
        let reviewer = create_user(&f.pool, "reviewer@example.com", ROLE_REVIEWER).await;
        let id = f.service.create(&author, new_content("Flow")).await.unwrap().item.id;

        let result = f.service.transition(&reviewer, id, WorkflowState::Published).await;
        assert!(matches!(
            result,
            Err(ContentServiceError::InvalidTransition {
                from: WorkflowState::Draft,
                to: WorkflowState::Published
            })
        ));

        let item = f.service.transition(&reviewer, id, WorkflowState::Review).await.unwrap();
        assert_eq!(item.status, "review");
        assert!(item.published_at.is_none());

        let item = f.service.publish(&reviewer, id).await.unwrap();
        assert_eq!(item.status, "published");
        assert!(item.published_at.is_some());
        assert_eq!(*f.search.indexed.lock().unwrap(), vec![id]);
        assert!(f.seo.get(id).await.is_ok());
        assert_eq!(f.seo.sitemap().await.unwrap().len(), 1);

        let item = f.service.transition(&reviewer, id, WorkflowState::Archived).await.unwrap();
        assert_eq!(item.status, "archived");
        assert_eq!(*f.search.removed.lock().unwrap(), vec![id]);
        assert!(f.seo.sitemap().await.unwrap().is_empty());

        // archived is terminal
        for target in WorkflowState::ALL {
            assert!(f.service.transition(&reviewer, id, target).await.is_err());
        }
        assert!(matches!(
            f.service.transition(&reviewer, 999, WorkflowState::Review).await,
            Err(ContentServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_search_backend_failure_does_not_block_publish() {
        let f = setup_with_search(RecordingSearch {
            fail: true,
            ..Default::default()
        })
        .await;
        let editor = create_user(&f.pool, "editor@example.com", ROLE_EDITOR).await;
        let id = f.service.create(&editor, new_content("Resilient")).await.unwrap().item.id;

        f.service.transition(&editor, id, WorkflowState::Review).await.unwrap();
        let item = f.service.publish(&editor, id).await.unwrap();
        assert!(item.is_published());

        // falls back to title search
        let hits = f.service.search("resil").await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_visibility_for_anonymous_viewers() {
        let f = setup_test_service().await;
        let editor = create_user(&f.pool, "editor@example.com", ROLE_EDITOR).await;
        let draft = f.service.create(&editor, new_content("Draft")).await.unwrap().item;
        let live = f.service.create(&editor, new_content("Live")).await.unwrap().item;
        f.service.transition(&editor, live.id, WorkflowState::Review).await.unwrap();
        f.service.publish(&editor, live.id).await.unwrap();

        assert!(matches!(
            f.service.get(None, draft.id).await,
            Err(ContentServiceError::NotFound)
        ));
        assert!(f.service.get(Some(&editor), draft.id).await.is_ok());
        assert!(f.service.get_by_slug(None, "live").await.is_ok());

        let public = f.service.list(None, None, ListParams::default()).await.unwrap();
        assert_eq!(public.total, 1);
        let all = f.service.list(Some(&editor), None, ListParams::default()).await.unwrap();
        assert_eq!(all.total, 2);
        let drafts = f
            .service
            .list(Some(&editor), Some(WorkflowState::Draft), ListParams::default())
            .await
            .unwrap();
        assert_eq!(drafts.items[0].id, draft.id);
    }

    #[tokio::test]
    async fn test_search_prefers_backend_hits() {
        let f = setup_test_service().await;
        let editor = create_user(&f.pool, "editor@example.com", ROLE_EDITOR).await;
        let a = f.service.create(&editor, new_content("Alpha")).await.unwrap().item;
        let b = f.service.create(&editor, new_content("Beta")).await.unwrap().item;
        for id in [a.id, b.id] {
            f.service.transition(&editor, id, WorkflowState::Review).await.unwrap();
            f.service.publish(&editor, id).await.unwrap();
        }

        *f.search.hits.lock().unwrap() = vec![b.id];
        let hits = f.service.search("alpha").await.unwrap();
        assert_eq!(hits.iter().map(|i| i.id).collect::<Vec<_>>(), vec![b.id]);

        *f.search.hits.lock().unwrap() = vec![];
        let hits = f.service.search("alpha").await.unwrap();
        assert_eq!(hits.iter().map(|i| i.id).collect::<Vec<_>>(), vec![a.id]);

        assert!(matches!(
            f.service.search("  ").await,
            Err(ContentServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let f = setup_test_service().await;
        let editor = create_user(&f.pool, "editor@example.com", ROLE_EDITOR).await;
        let id = f.service.create(&editor, new_content("Gone")).await.unwrap().item.id;

        f.service.delete(&editor, id).await.unwrap();
        assert_eq!(*f.search.removed.lock().unwrap(), vec![id]);
        assert!(matches!(f.service.delete(&editor, id).await, Err(ContentServiceError::NotFound)));
        assert!(matches!(f.service.versions(id).await, Err(ContentServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_categories() {
        let f = setup_test_service().await;
        let editor = create_user(&f.pool, "editor@example.com", ROLE_EDITOR).await;

        let news = f.service.create_category(&editor, "News", None, None).await.unwrap();
        assert_eq!(news.slug, "news");
        let local = f
            .service
            .create_category(&editor, "Local news", Some("local"), Some(news.id))
            .await
            .unwrap();
        assert_eq!(local.parent_id, Some(news.id));

        assert!(matches!(
            f.service.create_category(&editor, "News", None, None).await,
            Err(ContentServiceError::SlugExists(_))
        ));
        assert!(matches!(
            f.service.create_category(&editor, "Orphan", None, Some(999)).await,
            Err(ContentServiceError::CategoryNotFound)
        ));
        assert_eq!(f.service.list_categories().await.unwrap().len(), 2);

        let mut input = new_content("Filed");
        input.category_ids = vec![news.id, 999];
        let detail = f.service.create(&editor, input).await.unwrap();
        assert_eq!(detail.categories, vec![news]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Generated slugs are always valid or empty.
        #[test]
        fn generated_slugs_are_valid(title in "\\PC{0,60}") {
            let slug = generate_slug(&title);
            prop_assert!(slug.is_empty() || is_valid_slug(&slug));
            prop_assert!(!slug.starts_with('-') && !slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
        }

        /// Slugging is idempotent.
        #[test]
        fn slug_is_idempotent(title in "[A-Za-z0-9 _.!-]{0,40}") {
            let once = generate_slug(&title);
            prop_assert_eq!(generate_slug(&once), once.clone());
        }
    }
}
