//! Authentication and account-security service for the CaseHub platform.

pub mod config;
pub mod db;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::services::{AuthService, TokenService, UserStore, VolatileStore};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn UserStore>,
    pub cache: Arc<dyn VolatileStore>,
    pub tokens: TokenService,
    pub auth: AuthService,
}

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/auth/me", get(handlers::auth::me))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/verify-email", post(handlers::auth::verify_email))
        .route(
            "/auth/resend-verification",
            post(handlers::auth::resend_verification),
        )
        .route("/auth/forgot-password", post(handlers::auth::forgot_password))
        .route("/auth/reset-password", post(handlers::auth::reset_password))
        .route("/auth/unlock-account", post(handlers::auth::unlock_account))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/logout", post(handlers::auth::logout))
        .merge(protected)
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %Uuid::new_v4(),
                )
            },
        ))
        .with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Skipping unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let postgres = match state.store.health_check().await {
        Ok(()) => "ok",
        Err(err) => {
            tracing::error!(error = %err, "Postgres health check failed");
            "unavailable"
        }
    };
    let redis = match state.cache.health_check().await {
        Ok(()) => "ok",
        Err(err) => {
            tracing::error!(error = %err, "Redis health check failed");
            "unavailable"
        }
    };
    let status = if postgres == "ok" && redis == "ok" {
        "ok"
    } else {
        "degraded"
    };

    Json(json!({
        "status": status,
        "service": state.config.service_name,
        "version": state.config.service_version,
        "checks": {
            "postgres": postgres,
            "redis": redis,
        }
    }))
}
