//! SEO API endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, ApiJson, AppState};
use crate::models::{SeoMetadata, SitemapEntry};
use crate::services::SeoServiceError;

#[derive(Debug, Deserialize)]
pub struct RecalculateRequest {
    pub content_id: i64,
}

fn seo_error(e: SeoServiceError) -> ApiError {
    match e {
        SeoServiceError::ContentNotFound => ApiError::not_found("Content not found"),
        SeoServiceError::NotFound => ApiError::not_found("SEO metadata not found"),
        SeoServiceError::InternalError(err) => ApiError::internal_error(&err),
    }
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/sitemaps", get(sitemap))
}

/// Routes for editors and admins
pub fn editor_router() -> Router<AppState> {
    Router::new()
        .route("/recalculate", post(recalculate))
        .route("/{content_id}", get(get_metadata))
}

/// GET /api/seo/sitemaps
async fn sitemap(State(state): State<AppState>) -> Result<Json<Vec<SitemapEntry>>, ApiError> {
    Ok(Json(state.seo_service.sitemap().await.map_err(seo_error)?))
}

/// POST /api/seo/recalculate
async fn recalculate(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RecalculateRequest>,
) -> Result<Json<SeoMetadata>, ApiError> {
    let metadata = state
        .seo_service
        .recalculate(body.content_id)
        .await
        .map_err(seo_error)?;
    Ok(Json(metadata))
}

/// GET /api/seo/{content_id}
async fn get_metadata(
    State(state): State<AppState>,
    Path(content_id): Path<i64>,
) -> Result<Json<SeoMetadata>, ApiError> {
    Ok(Json(
        state.seo_service.get(content_id).await.map_err(seo_error)?,
    ))
}
