//! Media API endpoints
//!
//! Assets are either registered by URL with their variants or uploaded as
//! `multipart/form-data` with a single field named `file`.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, ApiJson, AppState, AuthenticatedUser};
use crate::models::{CreateMediaInput, CreateVariantInput, MediaAsset, MediaType};
use crate::services::MediaServiceError;

/// Multipart overhead allowed on top of the configured file size
const MULTIPART_SLACK_BYTES: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
pub struct RegisterMediaRequest {
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub filename: String,
    pub storage_url: String,
    pub checksum: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub duration: Option<f64>,
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub variants: Vec<CreateVariantInput>,
}

fn media_error(e: MediaServiceError) -> ApiError {
    match e {
        MediaServiceError::NotFound => ApiError::not_found("Media not found"),
        MediaServiceError::ValidationError(msg) => ApiError::validation_error(msg),
        MediaServiceError::Conflict(msg) => ApiError::conflict(msg),
        MediaServiceError::InternalError(err) => ApiError::internal_error(&err),
    }
}

/// Routes for authors, editors and admins
pub fn author_router(max_file_size: u64) -> Router<AppState> {
    let body_limit = usize::try_from(max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_SLACK_BYTES);

    Router::new()
        .route("/", get(list_media).post(register_media))
        .route(
            "/upload",
            post(upload_media).layer(DefaultBodyLimit::max(body_limit)),
        )
}

/// Routes for any authenticated user
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/{id}", get(get_media))
}

/// Routes for editors and admins
pub fn editor_router() -> Router<AppState> {
    Router::new().route("/{id}", axum::routing::delete(delete_media))
}

/// GET /api/media
async fn list_media(State(state): State<AppState>) -> Result<Json<Vec<MediaAsset>>, ApiError> {
    Ok(Json(state.media_service.list().await.map_err(media_error)?))
}

/// POST /api/media
async fn register_media(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(body): ApiJson<RegisterMediaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let asset = state
        .media_service
        .register(
            &user,
            CreateMediaInput {
                media_type: body.media_type,
                filename: body.filename,
                storage_url: body.storage_url,
                checksum: body.checksum,
                width: body.width,
                height: body.height,
                duration: body.duration,
                metadata: body.metadata,
                uploaded_by: None,
                variants: body.variants,
            },
        )
        .await
        .map_err(media_error)?;
    Ok((StatusCode::CREATED, Json(asset)))
}

/// POST /api/media/upload
async fn upload_media(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read file: {}", e)))?;

        let asset = state
            .media_service
            .upload(&user, filename.as_deref(), &content_type, &data)
            .await
            .map_err(media_error)?;
        return Ok((StatusCode::CREATED, Json(asset)));
    }

    Err(ApiError::bad_request("No file provided"))
}

/// GET /api/media/{id}
async fn get_media(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MediaAsset>, ApiError> {
    Ok(Json(state.media_service.get(id).await.map_err(media_error)?))
}

/// DELETE /api/media/{id}
async fn delete_media(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .media_service
        .delete(&user, id)
        .await
        .map_err(media_error)?;
    Ok(StatusCode::NO_CONTENT)
}
