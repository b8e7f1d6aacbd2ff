//! Analytics API endpoints
//!
//! Event collection is public; a valid bearer token attaches the user.
//! Reporting and dashboards are for editors and admins.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::api::middleware::{ApiError, ApiJson, AppState, AuthenticatedUser, OptionalUser};
use crate::models::{AnalyticsEvent, AnalyticsSummary, Dashboard};
use crate::services::{AnalyticsServiceError, TrackEvent};

#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub event_type: String,
    pub session_id: Option<String>,
    pub payload: Option<serde_json::Value>,
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDashboardRequest {
    pub name: String,
    #[serde(default)]
    pub definition: serde_json::Value,
}

fn analytics_error(e: AnalyticsServiceError) -> ApiError {
    match e {
        AnalyticsServiceError::ValidationError(msg) => ApiError::validation_error(msg),
        AnalyticsServiceError::DashboardExists(name) => {
            ApiError::conflict(format!("Dashboard '{}' already exists", name))
        }
        AnalyticsServiceError::InternalError(err) => ApiError::internal_error(&err),
    }
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/events", post(track_event))
}

/// Routes for editors and admins
pub fn editor_router() -> Router<AppState> {
    Router::new()
        .route("/summary", get(summary))
        .route("/events", get(recent_events))
        .route("/dashboards", get(list_dashboards).post(create_dashboard))
}

/// POST /api/analytics/events
async fn track_event(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    ApiJson(body): ApiJson<EventRequest>,
) -> Result<Response, ApiError> {
    let stored = state
        .analytics_service
        .track(
            user.as_ref(),
            TrackEvent {
                event_type: body.event_type,
                session_id: body.session_id,
                payload: body.payload,
                occurred_at: body.occurred_at,
            },
        )
        .await
        .map_err(analytics_error)?;

    Ok(match stored {
        Some(event) => (StatusCode::CREATED, Json(event)).into_response(),
        None => (StatusCode::ACCEPTED, Json(json!({ "accepted": false }))).into_response(),
    })
}

/// GET /api/analytics/summary
async fn summary(State(state): State<AppState>) -> Result<Json<AnalyticsSummary>, ApiError> {
    Ok(Json(
        state.analytics_service.summary().await.map_err(analytics_error)?,
    ))
}

/// GET /api/analytics/events?limit=
async fn recent_events(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<AnalyticsEvent>>, ApiError> {
    Ok(Json(
        state
            .analytics_service
            .recent_events(query.limit)
            .await
            .map_err(analytics_error)?,
    ))
}

/// GET /api/analytics/dashboards
async fn list_dashboards(State(state): State<AppState>) -> Result<Json<Vec<Dashboard>>, ApiError> {
    Ok(Json(
        state
            .analytics_service
            .list_dashboards()
            .await
            .map_err(analytics_error)?,
    ))
}

/// POST /api/analytics/dashboards
async fn create_dashboard(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(body): ApiJson<CreateDashboardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let dashboard = state
        .analytics_service
        .create_dashboard(&user, &body.name, body.definition)
        .await
        .map_err(analytics_error)?;
    Ok((StatusCode::CREATED, Json(dashboard)))
}
