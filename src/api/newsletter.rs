//! Newsletter API endpoints

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::MessageResponse;
use crate::api::middleware::{ApiError, ApiJson, AppState};
use crate::models::NewsletterSubscription;
use crate::services::NewsletterServiceError;

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub email: String,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    pub email: String,
}

fn newsletter_error(e: NewsletterServiceError) -> ApiError {
    match e {
        NewsletterServiceError::NotFound => ApiError::not_found("Subscription not found"),
        NewsletterServiceError::ValidationError(msg) => ApiError::validation_error(msg),
        NewsletterServiceError::InternalError(err) => ApiError::internal_error(&err),
    }
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/subscribe", post(subscribe))
        .route("/unsubscribe", post(unsubscribe))
}

/// Routes for editors and admins
pub fn editor_router() -> Router<AppState> {
    Router::new().route("/subscribers", get(list_subscribers))
}

/// POST /api/newsletter/subscribe
async fn subscribe(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SubscribeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let subscription = state
        .newsletter_service
        .subscribe(&body.email, body.source.as_deref())
        .await
        .map_err(newsletter_error)?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

/// POST /api/newsletter/unsubscribe
async fn unsubscribe(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<UnsubscribeRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .newsletter_service
        .unsubscribe(&body.email)
        .await
        .map_err(newsletter_error)?;
    Ok(Json(MessageResponse::new("Unsubscribed")))
}

/// GET /api/newsletter/subscribers
async fn list_subscribers(
    State(state): State<AppState>,
) -> Result<Json<Vec<NewsletterSubscription>>, ApiError> {
    Ok(Json(
        state.newsletter_service.list().await.map_err(newsletter_error)?,
    ))
}
