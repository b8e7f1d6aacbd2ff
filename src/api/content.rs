//! Content API endpoints
//!
//! Routers are split by the role guard the API layer wraps them in:
//! - public: listing, lookup, search, categories (anonymous callers only see
//!   published items)
//! - authenticated: version history
//! - authors: create and edit
//! - reviewers: workflow transitions
//! - editors: publish, delete, create categories

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{default_page, default_per_page, PageResponse};
use crate::api::middleware::{ApiError, ApiJson, AppState, AuthenticatedUser, OptionalUser};
use crate::models::{Category, ContentItem, ContentMediaLink, ContentVersion, ListParams, WorkflowState};
use crate::services::{ContentChanges, ContentDetail, ContentServiceError, NewContent};

#[derive(Debug, Deserialize)]
pub struct ContentListQuery {
    pub workflow_state: Option<WorkflowState>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateContentRequest {
    #[serde(rename = "type", default)]
    pub content_type: Option<String>,
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub category_ids: Vec<i64>,
    #[serde(default)]
    pub media: Vec<ContentMediaLink>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateContentRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub body: Option<String>,
    pub diff: Option<serde_json::Value>,
    pub category_ids: Option<Vec<i64>>,
    pub media: Option<Vec<ContentMediaLink>>,
}

#[derive(Debug, Deserialize)]
pub struct WorkflowRequest {
    pub workflow_state: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

fn content_error(e: ContentServiceError) -> ApiError {
    match e {
        ContentServiceError::NotFound => ApiError::not_found("Content not found"),
        ContentServiceError::CategoryNotFound => ApiError::not_found("Category not found"),
        ContentServiceError::Forbidden(msg) => ApiError::forbidden(msg),
        ContentServiceError::ValidationError(msg) => ApiError::validation_error(msg),
        ContentServiceError::SlugExists(slug) => {
            ApiError::conflict(format!("Slug '{}' already exists", slug))
        }
        ContentServiceError::InvalidTransition { from, to } => ApiError::with_details(
            "BAD_REQUEST",
            "Invalid workflow transition",
            serde_json::json!({ "from": from, "to": to }),
        ),
        ContentServiceError::InternalError(err) => ApiError::internal_error(&err),
    }
}

/// Routes open to anonymous callers
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_content))
        .route("/search", get(search_content))
        .route("/categories", get(list_categories))
        .route("/slug/{slug}", get(get_content_by_slug))
        .route("/{id}", get(get_content))
}

/// Routes for any authenticated user
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/{id}/versions", get(list_versions))
}

/// Routes for authors, editors and admins
pub fn author_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_content))
        .route("/{id}", put(update_content))
}

/// Routes for reviewers, editors and admins
pub fn reviewer_router() -> Router<AppState> {
    Router::new().route("/{id}/workflow", post(transition_content))
}

/// Routes for editors and admins
pub fn editor_router() -> Router<AppState> {
    Router::new()
        .route("/{id}/publish", post(publish_content))
        .route("/{id}", axum::routing::delete(delete_content))
        .route("/categories", post(create_category))
}

/// GET /api/content
async fn list_content(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    Query(query): Query<ContentListQuery>,
) -> Result<Json<PageResponse<ContentItem>>, ApiError> {
    let result = state
        .content_service
        .list(
            viewer.as_ref(),
            query.workflow_state,
            ListParams::new(query.page, query.per_page),
        )
        .await
        .map_err(content_error)?;
    Ok(Json(result.into()))
}

/// GET /api/content/{id}
async fn get_content(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    Path(id): Path<i64>,
) -> Result<Json<ContentDetail>, ApiError> {
    let detail = state
        .content_service
        .get(viewer.as_ref(), id)
        .await
        .map_err(content_error)?;
    Ok(Json(detail))
}

/// GET /api/content/slug/{slug}
async fn get_content_by_slug(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    Path(slug): Path<String>,
) -> Result<Json<ContentDetail>, ApiError> {
    let detail = state
        .content_service
        .get_by_slug(viewer.as_ref(), &slug)
        .await
        .map_err(content_error)?;
    Ok(Json(detail))
}

/// GET /api/content/search?query=
async fn search_content(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<ContentItem>>, ApiError> {
    let items = state
        .content_service
        .search(&query.query)
        .await
        .map_err(content_error)?;
    Ok(Json(items))
}

/// POST /api/content
async fn create_content(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(body): ApiJson<CreateContentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state
        .content_service
        .create(
            &user,
            NewContent {
                content_type: body.content_type,
                title: body.title,
                slug: body.slug,
                body: body.body,
                category_ids: body.category_ids,
                media: body.media,
            },
        )
        .await
        .map_err(content_error)?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// PUT /api/content/{id}
async fn update_content(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<UpdateContentRequest>,
) -> Result<Json<ContentDetail>, ApiError> {
    let detail = state
        .content_service
        .update(
            &user,
            id,
            ContentChanges {
                title: body.title,
                slug: body.slug,
                content_type: body.content_type,
                body: body.body,
                diff: body.diff,
                category_ids: body.category_ids,
                media: body.media,
            },
        )
        .await
        .map_err(content_error)?;
    Ok(Json(detail))
}

/// GET /api/content/{id}/versions
async fn list_versions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ContentVersion>>, ApiError> {
    Ok(Json(
        state.content_service.versions(id).await.map_err(content_error)?,
    ))
}

/// POST /api/content/{id}/workflow
async fn transition_content(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<WorkflowRequest>,
) -> Result<Json<ContentItem>, ApiError> {
    let target: WorkflowState = body
        .workflow_state
        .parse()
        .map_err(|e: anyhow::Error| ApiError::validation_error(e.to_string()))?;

    let item = state
        .content_service
        .transition(&user, id, target)
        .await
        .map_err(content_error)?;
    Ok(Json(item))
}

/// POST /api/content/{id}/publish
async fn publish_content(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ContentItem>, ApiError> {
    let item = state
        .content_service
        .publish(&user, id)
        .await
        .map_err(content_error)?;
    Ok(Json(item))
}

/// DELETE /api/content/{id}
async fn delete_content(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .content_service
        .delete(&user, id)
        .await
        .map_err(content_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/content/categories
async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(
        state.content_service.list_categories().await.map_err(content_error)?,
    ))
}

/// POST /api/content/categories
async fn create_category(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(body): ApiJson<CreateCategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state
        .content_service
        .create_category(&user, &body.name, body.slug.as_deref(), body.parent_id)
        .await
        .map_err(content_error)?;
    Ok((StatusCode::CREATED, Json(category)))
}
