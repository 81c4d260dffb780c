use std::sync::Arc;

use casehub_auth::config::AppConfig;
use casehub_auth::services::{AuthService, LogMailer, PgStore, RedisCache, TokenService};
use casehub_auth::{build_router, db, observability, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    observability::init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        "Starting service"
    );

    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool).await?;

    let store = Arc::new(PgStore::new(pool));
    let cache = Arc::new(RedisCache::new(&config.redis).await?);
    let tokens = TokenService::new(&config.jwt);
    let auth = AuthService::new(
        store.clone(),
        cache.clone(),
        Arc::new(LogMailer),
        tokens.clone(),
        config.security.clone(),
        config.hashing.clone(),
    );

    let state = AppState {
        config: config.clone(),
        store,
        cache,
        tokens,
        auth,
    };

    let app = build_router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .unwrap_or_else(|e| tracing::error!(error = %e, "Failed to install Ctrl+C handler"));
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
