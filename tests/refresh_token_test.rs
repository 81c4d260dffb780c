mod common;

use common::{read_json, refresh_cookie_value, spawn_app, STRONG_PASSWORD};

async fn login_session(app: &common::TestApp) -> (String, String) {
    let response = app.login("owner@example.com", STRONG_PASSWORD).await;
    assert_eq!(response.status(), 200);
    let cookie = refresh_cookie_value(&response).unwrap();
    let body = read_json(response).await;
    let access = body["data"]["accessToken"].as_str().unwrap().to_string();
    (cookie, access)
}

#[tokio::test]
async fn refresh_mints_a_usable_access_token() {
    let app = spawn_app();
    app.register_verified("owner@example.com", "Acme QA").await;
    let (cookie, _) = login_session(&app).await;

    let response = app
        .post_with_cookie("/auth/refresh", Some(&cookie), None)
        .await;
    assert_eq!(response.status(), 200);
    let body = read_json(response).await;
    let access = body["data"]["accessToken"].as_str().unwrap();

    let response = app.get("/auth/me", Some(access)).await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn refresh_without_cookie_is_unauthorized() {
    let app = spawn_app();
    let response = app.post_with_cookie("/auth/refresh", None, None).await;
    assert_eq!(response.status(), 401);
    let body = read_json(response).await;
    assert_eq!(body["error"]["code"], "AUTH_INVALID");
    assert_eq!(body["error"]["message"], "Refresh token not found");
}

#[tokio::test]
async fn access_token_in_the_cookie_is_refused() {
    let app = spawn_app();
    app.register_verified("owner@example.com", "Acme QA").await;
    let (_, access) = login_session(&app).await;

    let response = app
        .post_with_cookie("/auth/refresh", Some(&access), None)
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn garbage_cookie_is_refused() {
    let app = spawn_app();
    let response = app
        .post_with_cookie("/auth/refresh", Some("not-a-jwt"), None)
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn a_newer_login_invalidates_earlier_refresh_tokens() {
    let app = spawn_app();
    app.register_verified("owner@example.com", "Acme QA").await;
    let (first, _) = login_session(&app).await;
    let (second, _) = login_session(&app).await;

    let response = app
        .post_with_cookie("/auth/refresh", Some(&first), None)
        .await;
    assert_eq!(response.status(), 401);

    let response = app
        .post_with_cookie("/auth/refresh", Some(&second), None)
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn refresh_does_not_rotate_the_token() {
    let app = spawn_app();
    app.register_verified("owner@example.com", "Acme QA").await;
    let (cookie, _) = login_session(&app).await;

    // The same cookie keeps working across refreshes.
    for _ in 0..3 {
        let response = app
            .post_with_cookie("/auth/refresh", Some(&cookie), None)
            .await;
        assert_eq!(response.status(), 200);
    }
}

#[tokio::test]
async fn refresh_for_a_deleted_user_is_unauthorized() {
    use casehub_auth::services::UserStore;

    let app = spawn_app();
    app.register_verified("owner@example.com", "Acme QA").await;
    let (cookie, _) = login_session(&app).await;

    let user = app
        .store
        .find_user_by_email("owner@example.com")
        .await
        .unwrap()
        .unwrap();
    app.store.delete_user(user.id);

    let response = app
        .post_with_cookie("/auth/refresh", Some(&cookie), None)
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = spawn_app();
    app.register_verified("owner@example.com", "Acme QA").await;
    let (cookie, access) = login_session(&app).await;

    let response = app
        .post_with_cookie("/auth/logout", Some(&cookie), Some(&access))
        .await;
    assert_eq!(response.status(), 204);
    // The clearing cookie is set on the way out.
    let cleared = refresh_cookie_value(&response).unwrap();
    assert!(cleared.is_empty());

    let response = app
        .post_with_cookie("/auth/refresh", Some(&cookie), None)
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn logout_without_a_token_still_returns_no_content() {
    let app = spawn_app();
    let response = app.post_with_cookie("/auth/logout", None, None).await;
    assert_eq!(response.status(), 204);
    // The clearing cookie goes out regardless.
    assert_eq!(refresh_cookie_value(&response).as_deref(), Some(""));
}

#[tokio::test]
async fn logout_with_a_garbage_token_still_returns_no_content() {
    let app = spawn_app();
    app.register_verified("owner@example.com", "Acme QA").await;
    let (cookie, _) = login_session(&app).await;

    let response = app
        .post_with_cookie("/auth/logout", Some(&cookie), Some("not-a-jwt"))
        .await;
    assert_eq!(response.status(), 204);

    // Without a verifiable identity no mirror was dropped, so the
    // session itself survives.
    let response = app
        .post_with_cookie("/auth/refresh", Some(&cookie), None)
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn repeated_logout_still_returns_no_content() {
    let app = spawn_app();
    app.register_verified("owner@example.com", "Acme QA").await;
    let (cookie, access) = login_session(&app).await;

    for _ in 0..2 {
        let response = app
            .post_with_cookie("/auth/logout", Some(&cookie), Some(&access))
            .await;
        assert_eq!(response.status(), 204);
    }
}
