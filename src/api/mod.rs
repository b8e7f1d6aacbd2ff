//! API layer - HTTP handlers and routing
//!
//! Every feature module exposes one router per access group. The groups are
//! wrapped with the matching guard here and merged under `/api`:
//! - public routes resolve an optional bearer token
//! - protected routes require any authenticated user
//! - author, reviewer, editor and admin routes additionally require a role

pub mod analytics;
pub mod auth;
pub mod common;
pub mod content;
pub mod media;
pub mod middleware;
pub mod newsletter;
pub mod observability;
pub mod seo;
pub mod users;
pub mod webhooks;

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state, Next},
    routing::get,
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub use middleware::{ApiError, AppState, AuthenticatedUser, OptionalUser};
pub use observability::{Metrics, TrustedHosts};

use middleware::{ADMINS, AUTHORS, EDITORS, REVIEWERS};

/// Require a bearer token for every route in `router`
fn authenticated(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    router.route_layer(from_fn_with_state(state.clone(), middleware::require_auth))
}

/// Require a bearer token and one of `roles` for every route in `router`
fn guarded(
    router: Router<AppState>,
    roles: &'static [&'static str],
    state: &AppState,
) -> Router<AppState> {
    // Layers added later run first, so authentication precedes the role check.
    let router = router.route_layer(from_fn(move |request: Request, next: Next| {
        middleware::require_roles(roles, request, next)
    }));
    authenticated(router, state)
}

/// Build the `/api` router
pub fn build_api_router(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .nest("/auth", auth::public_router())
        .nest("/content", content::public_router())
        .nest("/seo", seo::public_router())
        .nest("/analytics", analytics::public_router())
        .nest("/newsletter", newsletter::public_router())
        .route_layer(from_fn_with_state(state.clone(), middleware::optional_auth));

    let protected = authenticated(
        Router::new()
            .nest("/auth", auth::protected_router())
            .nest("/content", content::protected_router())
            .nest("/media", media::protected_router()),
        state,
    );

    let authors = guarded(
        Router::new()
            .nest("/content", content::author_router())
            .nest(
                "/media",
                media::author_router(state.config.upload.max_file_size),
            ),
        AUTHORS,
        state,
    );

    let reviewers = guarded(
        Router::new().nest("/content", content::reviewer_router()),
        REVIEWERS,
        state,
    );

    let editors = guarded(
        Router::new()
            .nest("/content", content::editor_router())
            .nest("/media", media::editor_router())
            .nest("/seo", seo::editor_router())
            .nest("/analytics", analytics::editor_router())
            .nest("/newsletter", newsletter::editor_router())
            .nest("/notifications", webhooks::router()),
        EDITORS,
        state,
    );

    let admins = guarded(users::router(), ADMINS, state);

    public
        .merge(protected)
        .merge(authors)
        .merge(reviewers)
        .merge(editors)
        .merge(admins)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Mount point for uploaded files, `/uploads` unless configured otherwise
fn uploads_prefix(public_prefix: &str) -> String {
    let trimmed = public_prefix.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/uploads".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Build the complete application with its middleware stack
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.allowed_origins);
    let uploads = uploads_prefix(&state.config.upload.public_prefix);

    Router::new()
        .nest("/api", build_api_router(&state))
        .route("/health", get(observability::health))
        .route("/metrics", get(observability::metrics))
        .nest_service(&uploads, ServeDir::new(&state.config.upload.path))
        .layer(from_fn_with_state(state.clone(), observability::rate_limit))
        .layer(from_fn_with_state(
            state.clone(),
            observability::security_headers,
        ))
        .layer(from_fn_with_state(state.clone(), observability::trusted_hosts))
        // Outermost of the custom layers so rejected requests are still counted
        .layer(from_fn_with_state(state.clone(), observability::track_requests))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
