//! Lavamedia - a headless CMS backend

use anyhow::Result;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lavamedia::{
    api::{self, AppState},
    config::{Config, LogFormat},
    db,
};

/// How often expired rate limiter windows are dropped
const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lavamedia=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load_with_env(Path::new("config.yml"))?;
    init_tracing(config.logging.format);

    tracing::info!(
        environment = %config.app.environment,
        "Starting {}...",
        config.app.name
    );

    config.validate()?;
    if config.uses_default_secret() {
        tracing::warn!("Using the default secret key; set LAVAMEDIA_SECURITY_SECRET_KEY before deploying");
    }

    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {}", config.database.url);

    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::build(config, pool.clone())?;
    if !state.analytics_service.is_enabled() {
        tracing::info!("Analytics collection disabled; events are accepted but not stored");
    }

    // Drop expired rate limiter windows periodically
    {
        let request_limiter = state.request_limiter.clone();
        let auth_service = state.auth_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(LIMITER_CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                request_limiter.cleanup().await;
                auth_service.login_limiter().cleanup().await;
            }
        });
    }

    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    pool.close().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
