//! Webhook management endpoints (editors and admins)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, ApiJson, AppState, AuthenticatedUser};
use crate::models::{CreateWebhookInput, Webhook, WebhookStatus};
use crate::services::NotificationServiceError;

#[derive(Debug, Deserialize)]
pub struct CreateWebhookRequest {
    pub name: String,
    pub target_url: String,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWebhookRequest {
    pub status: String,
}

fn webhook_error(e: NotificationServiceError) -> ApiError {
    match e {
        NotificationServiceError::NotFound => ApiError::not_found("Webhook not found"),
        NotificationServiceError::ValidationError(msg) => ApiError::validation_error(msg),
        NotificationServiceError::InternalError(err) => ApiError::internal_error(&err),
    }
}

fn parse_status(status: &str) -> Result<WebhookStatus, ApiError> {
    status
        .parse()
        .map_err(|e: anyhow::Error| ApiError::validation_error(e.to_string()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhooks", get(list_webhooks).post(create_webhook))
        .route("/webhooks/{id}", patch(update_webhook).delete(delete_webhook))
}

/// GET /api/notifications/webhooks
async fn list_webhooks(State(state): State<AppState>) -> Result<Json<Vec<Webhook>>, ApiError> {
    Ok(Json(
        state
            .notification_service
            .list_webhooks()
            .await
            .map_err(webhook_error)?,
    ))
}

/// POST /api/notifications/webhooks
async fn create_webhook(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(body): ApiJson<CreateWebhookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let status = match body.status.as_deref() {
        Some(s) => parse_status(s)?,
        None => WebhookStatus::Active,
    };

    let webhook = state
        .notification_service
        .create_webhook(
            &user,
            CreateWebhookInput {
                name: body.name,
                target_url: body.target_url,
                secret: body.secret,
                status,
            },
        )
        .await
        .map_err(webhook_error)?;
    Ok((StatusCode::CREATED, Json(webhook)))
}

/// PATCH /api/notifications/webhooks/{id}
async fn update_webhook(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<UpdateWebhookRequest>,
) -> Result<Json<Webhook>, ApiError> {
    let status = parse_status(&body.status)?;
    let webhook = state
        .notification_service
        .update_status(&user, id, status)
        .await
        .map_err(webhook_error)?;
    Ok(Json(webhook))
}

/// DELETE /api/notifications/webhooks/{id}
async fn delete_webhook(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .notification_service
        .delete_webhook(&user, id)
        .await
        .map_err(webhook_error)?;
    Ok(StatusCode::NO_CONTENT)
}
