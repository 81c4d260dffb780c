//! Shared harness: the full router wired to in-memory doubles.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use serde_json::Value;
use tower::util::ServiceExt;

use casehub_auth::config::{
    AppConfig, DatabaseConfig, Environment, HashingConfig, JwtConfig, RedisConfig, SecurityConfig,
};
use casehub_auth::services::{
    AuthService, MailKind, MemoryCache, MemoryStore, RecordingMailer, TokenService,
};
use casehub_auth::{build_router, AppState};

pub const STRONG_PASSWORD: &str = "V3lvet!Quokka#2024";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryCache>,
    pub mailer: Arc<RecordingMailer>,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        environment: Environment::Dev,
        service_name: "casehub-auth".to_string(),
        service_version: "test".to_string(),
        log_level: "warn".to_string(),
        otlp_endpoint: None,
        port: 0,
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        redis: RedisConfig {
            url: "redis://unused".to_string(),
        },
        jwt: JwtConfig {
            secret: "a-test-secret-that-is-long-enough!!".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        },
        security: SecurityConfig::default(),
        hashing: HashingConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        },
        allowed_origins: vec!["http://localhost:3000".to_string()],
    }
}

pub fn spawn_app() -> TestApp {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(MemoryCache::new());
    let mailer = Arc::new(RecordingMailer::new());
    let tokens = TokenService::new(&config.jwt);
    let auth = AuthService::new(
        store.clone(),
        cache.clone(),
        mailer.clone(),
        tokens.clone(),
        config.security.clone(),
        config.hashing.clone(),
    );
    let state = AppState {
        config,
        store: store.clone(),
        cache: cache.clone(),
        tokens,
        auth,
    };
    TestApp {
        router: build_router(state),
        store,
        cache,
        mailer,
    }
}

impl TestApp {
    pub async fn post_json(&self, path: &str, body: Value) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri(path)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_with_cookie(
        &self,
        path: &str,
        cookie: Option<&str>,
        bearer: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method("POST").uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, format!("refresh_token={cookie}"));
        }
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn get(&self, path: &str, bearer: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(path);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Register an organization admin and return the access token.
    pub async fn register(&self, email: &str, organization: &str) -> String {
        let response = self
            .post_json(
                "/auth/register",
                serde_json::json!({
                    "email": email,
                    "password": STRONG_PASSWORD,
                    "firstName": "Ada",
                    "lastName": "Lovelace",
                    "organizationName": organization,
                }),
            )
            .await;
        assert_eq!(response.status(), 200, "registration failed");
        let body = read_json(response).await;
        body["data"]["accessToken"].as_str().unwrap().to_string()
    }

    /// Register and consume the emailed verification token.
    pub async fn register_verified(&self, email: &str, organization: &str) {
        self.register(email, organization).await;
        let token = self.mailer.last_token(MailKind::Verification).unwrap();
        let response = self
            .post_json("/auth/verify-email", serde_json::json!({ "token": token }))
            .await;
        assert_eq!(response.status(), 200, "verification failed");
    }

    pub async fn login(&self, email: &str, password: &str) -> Response<Body> {
        self.post_json(
            "/auth/login",
            serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }
}

pub async fn read_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn read_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Pull the refresh token value out of the Set-Cookie header.
pub fn refresh_cookie_value(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|raw| {
            raw.strip_prefix("refresh_token=")
                .map(|rest| rest.split(';').next().unwrap_or(rest).to_string())
        })
}
