use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use coachdesk::config::{Config, Secrets};
use coachdesk::db::Store;
use coachdesk::state::AppState;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

fn test_secrets() -> Secrets {
    Secrets {
        access_token_secret: "test-access-secret".to_string(),
        refresh_token_secret: "test-refresh-secret".to_string(),
        encryption_key: "test-encryption-key".to_string(),
    }
}

async fn spawn_app_with(tweak: impl FnOnce(&mut Config)) -> Router {
    let mut config = Config::default();
    // Low cost keeps the hashing-heavy flows fast in tests.
    config.security.bcrypt_cost = 4;
    tweak(&mut config);

    let store = Store::new("sqlite::memory:")
        .await
        .expect("Failed to connect test database");
    let state = AppState::with_store(config, &test_secrets(), store);
    coachdesk::api::router(state)
}

async fn spawn_app() -> Router {
    spawn_app_with(|config| config.server.dev_mode = true).await
}

async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }

    let request = if let Some(body) = body {
        builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    } else {
        builder.body(Body::empty()).unwrap()
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, json)
}

async fn register(app: &Router, name: &str, email: &str, password: &str, role: &str) -> Value {
    let (status, body) = request(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "name": name,
            "email": email,
            "password": password,
            "role": role,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    body["data"].clone()
}

async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
    request(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"email": email, "password": password})),
    )
    .await
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = spawn_app().await;

    let (status, body) = request(&app, "GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["message"], "ok");
}

#[tokio::test]
async fn test_register_login_me_flow() {
    let app = spawn_app().await;

    let registered = register(&app, "Alice", "a@b.com", "Abcdef1!", "trainer").await;
    let register_token = registered["accessToken"].as_str().unwrap().to_string();
    assert_eq!(registered["user"]["email"], "a@b.com");
    assert!(!registered["refreshToken"].as_str().unwrap().is_empty());

    let (status, body) = login(&app, "a@b.com", "Abcdef1!").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["email"], "a@b.com");
    assert_eq!(body["data"]["passwordChangeRequired"], false);

    // Fresh issuance: login mints its own token even when it lands in the
    // same second as registration.
    let login_token = body["data"]["accessToken"].as_str().unwrap().to_string();
    assert_ne!(login_token, register_token);

    let (status, body) = request(&app, "GET", "/api/auth/me", Some(&login_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "a@b.com");
    assert_eq!(body["data"]["role"], "trainer");

    // Tampered token: flip the last character of the signature.
    let mut tampered = login_token.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'A' { 'B' } else { 'A' });

    let (status, body) = request(&app, "GET", "/api/auth/me", Some(&tampered), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "invalid_token");
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let app = spawn_app().await;

    register(&app, "Alice", "dup@b.com", "Abcdef1!", "trainer").await;

    let (status, body) = request(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "name": "Other",
            "email": "DUP@B.COM",
            "password": "Abcdef1!",
            "role": "client",
        })),
    )
    .await;

    // Email matching is case-insensitive.
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "email_already_exists");
}

#[tokio::test]
async fn test_register_weak_password() {
    let app = spawn_app().await;

    let (status, body) = request(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "name": "Weak",
            "email": "weak@b.com",
            "password": "alllowercase",
            "role": "client",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "weak_password");
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = spawn_app().await;

    register(&app, "Alice", "real@b.com", "Abcdef1!", "trainer").await;

    let (wrong_status, wrong_body) = login(&app, "real@b.com", "WrongPass1!").await;
    let (unknown_status, unknown_body) = login(&app, "ghost@b.com", "Abcdef1!").await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body["code"], unknown_body["code"]);
    assert_eq!(wrong_body["error"], unknown_body["error"]);
}

#[tokio::test]
async fn test_refresh_token_flow() {
    let app = spawn_app().await;

    let registered = register(&app, "Alice", "refresh@b.com", "Abcdef1!", "client").await;
    let refresh_token = registered["refreshToken"].as_str().unwrap();

    let (status, body) = request(
        &app,
        "POST",
        "/api/auth/refresh-token",
        None,
        Some(json!({"refreshToken": refresh_token})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let new_access = body["data"]["accessToken"].as_str().unwrap();
    let (status, body) = request(&app, "GET", "/api/auth/me", Some(new_access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "refresh@b.com");

    // A refresh token is not an access token.
    let (status, _) = request(&app, "GET", "/api/auth/me", Some(refresh_token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = spawn_app().await;

    let (status, _) = request(&app, "GET", "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = request(
        &app,
        "POST",
        "/api/passwords/change",
        None,
        Some(json!({"currentPassword": "x", "newPassword": "y"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password_rejects_recent_reuse() {
    let app = spawn_app().await;

    let registered = register(&app, "Alice", "change@b.com", "Abcdef1!", "trainer").await;
    let token = registered["accessToken"].as_str().unwrap();

    let (status, _) = request(
        &app,
        "POST",
        "/api/passwords/change",
        Some(token),
        Some(json!({"currentPassword": "Abcdef1!", "newPassword": "Newpass1!"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Changing back to the original hits the history window.
    let (status, body) = request(
        &app,
        "POST",
        "/api/passwords/change",
        Some(token),
        Some(json!({"currentPassword": "Newpass1!", "newPassword": "Abcdef1!"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "password_reused");

    // Old password no longer logs in; the new one does.
    let (status, _) = login(&app, "change@b.com", "Abcdef1!").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = login(&app, "change@b.com", "Newpass1!").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_change_password_wrong_current() {
    let app = spawn_app().await;

    let registered = register(&app, "Alice", "wrongcur@b.com", "Abcdef1!", "trainer").await;
    let token = registered["accessToken"].as_str().unwrap();

    let (status, body) = request(
        &app,
        "POST",
        "/api/passwords/change",
        Some(token),
        Some(json!({"currentPassword": "NotMyPass1!", "newPassword": "Newpass1!"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "incorrect_password");
}

#[tokio::test]
async fn test_reset_token_is_single_use() {
    let app = spawn_app().await;

    register(&app, "Alice", "reset@b.com", "Abcdef1!", "client").await;

    let (status, body) = request(
        &app,
        "POST",
        "/api/passwords/request-reset",
        None,
        Some(json!({"email": "reset@b.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // dev_mode is enabled in the test app, so the token comes back directly.
    let token = body["data"]["token"].as_str().unwrap().to_string();
    assert_eq!(token.len(), 64);

    let (status, _) = request(
        &app,
        "POST",
        "/api/passwords/reset",
        None,
        Some(json!({"token": token, "newPassword": "Resetpw1!"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Second redemption with the same token fails.
    let (status, body) = request(
        &app,
        "POST",
        "/api/passwords/reset",
        None,
        Some(json!({"token": token, "newPassword": "Another1!"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_or_expired_token");

    let (status, _) = login(&app, "reset@b.com", "Resetpw1!").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = login(&app, "reset@b.com", "Abcdef1!").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_reset_request_does_not_reveal_accounts() {
    // dev_mode off: responses must be identical for known and unknown emails.
    let app = spawn_app_with(|_| {}).await;

    register(&app, "Alice", "known@x.com", "Abcdef1!", "client").await;

    let (known_status, known_body) = request(
        &app,
        "POST",
        "/api/passwords/request-reset",
        None,
        Some(json!({"email": "known@x.com"})),
    )
    .await;
    let (unknown_status, unknown_body) = request(
        &app,
        "POST",
        "/api/passwords/request-reset",
        None,
        Some(json!({"email": "unknown@x.com"})),
    )
    .await;

    assert_eq!(known_status, StatusCode::OK);
    assert_eq!(unknown_status, StatusCode::OK);
    assert_eq!(known_body, unknown_body);
}

#[tokio::test]
async fn test_admin_force_change_flow() {
    let app = spawn_app().await;

    let admin = register(&app, "Admin", "admin@b.com", "Adminpw1!", "admin").await;
    let admin_token = admin["accessToken"].as_str().unwrap();

    let user = register(&app, "Bob", "bob@b.com", "Bobpass1!", "client").await;
    let user_id = user["user"]["id"].as_i64().unwrap();
    let user_token = user["accessToken"].as_str().unwrap();

    let (status, body) = request(
        &app,
        "GET",
        "/api/passwords/check-change-required",
        Some(user_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["passwordChangeRequired"], false);

    let (status, _) = request(
        &app,
        "POST",
        &format!("/api/passwords/force-change/{user_id}"),
        Some(admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = request(
        &app,
        "GET",
        "/api/passwords/check-change-required",
        Some(user_token),
        None,
    )
    .await;
    assert_eq!(body["data"]["passwordChangeRequired"], true);

    // Advisory only: login still succeeds and surfaces the flag.
    let (status, body) = login(&app, "bob@b.com", "Bobpass1!").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["passwordChangeRequired"], true);

    // A successful change clears the flag.
    let (status, _) = request(
        &app,
        "POST",
        "/api/passwords/change",
        Some(user_token),
        Some(json!({"currentPassword": "Bobpass1!", "newPassword": "Bobpass2!"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = request(
        &app,
        "GET",
        "/api/passwords/check-change-required",
        Some(user_token),
        None,
    )
    .await;
    assert_eq!(body["data"]["passwordChangeRequired"], false);
}

#[tokio::test]
async fn test_admin_change_user_password() {
    let app = spawn_app().await;

    let admin = register(&app, "Admin", "admin2@b.com", "Adminpw1!", "admin").await;
    let admin_token = admin["accessToken"].as_str().unwrap();

    let user = register(&app, "Carol", "carol@b.com", "Carolpw1!", "trainer").await;
    let user_id = user["user"]["id"].as_i64().unwrap();

    let (status, _) = request(
        &app,
        "POST",
        "/api/passwords/change-user",
        Some(admin_token),
        Some(json!({
            "userId": user_id,
            "newPassword": "Newcarol1!",
            "forceChange": true,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = login(&app, "carol@b.com", "Newcarol1!").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["passwordChangeRequired"], true);

    let (status, _) = login(&app, "carol@b.com", "Carolpw1!").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_endpoints_reject_non_admins() {
    let app = spawn_app().await;

    let user = register(&app, "Bob", "plain@b.com", "Bobpass1!", "client").await;
    let token = user["accessToken"].as_str().unwrap();
    let user_id = user["user"]["id"].as_i64().unwrap();

    let (status, body) = request(
        &app,
        "GET",
        &format!("/api/passwords/history/{user_id}"),
        Some(token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, _) = request(
        &app,
        "POST",
        "/api/passwords/change-user",
        Some(token),
        Some(json!({"userId": user_id, "newPassword": "Whatever1!"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = request(
        &app,
        "POST",
        "/api/passwords/cleanup-tokens",
        Some(token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_password_history_never_exposes_hashes() {
    let app = spawn_app().await;

    let admin = register(&app, "Admin", "admin3@b.com", "Adminpw1!", "admin").await;
    let admin_token = admin["accessToken"].as_str().unwrap();

    let user = register(&app, "Dave", "dave@b.com", "Davepass1!", "client").await;
    let user_id = user["user"]["id"].as_i64().unwrap();
    let user_token = user["accessToken"].as_str().unwrap();

    let (status, _) = request(
        &app,
        "POST",
        "/api/passwords/change",
        Some(user_token),
        Some(json!({"currentPassword": "Davepass1!", "newPassword": "Davepass2!"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = request(
        &app,
        "GET",
        &format!("/api/passwords/history/{user_id}"),
        Some(admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Registration seeds the first entry; the change appends a second.
    let history = body["data"]["history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    for entry in history {
        assert!(entry["id"].is_i64());
        assert!(entry["changedAt"].is_string());
        assert!(entry.get("passwordHash").is_none());
        assert!(entry.get("password_hash").is_none());
    }
}

#[tokio::test]
async fn test_generate_password_endpoint() {
    let app = spawn_app().await;

    let user = register(&app, "Gen", "gen@b.com", "Genpass1!", "client").await;
    let token = user["accessToken"].as_str().unwrap();

    let (status, body) = request(
        &app,
        "POST",
        "/api/passwords/generate?length=16",
        Some(token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let password = body["data"]["password"].as_str().unwrap();
    assert_eq!(password.len(), 16);
    assert!(password.chars().any(|c| c.is_ascii_uppercase()));
    assert!(password.chars().any(|c| c.is_ascii_lowercase()));
    assert!(password.chars().any(|c| c.is_ascii_digit()));

    // An absurd length must clamp, not allocate (or take down the server).
    let (status, body) = request(
        &app,
        "POST",
        "/api/passwords/generate?length=18446744073709551615",
        Some(token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["password"].as_str().unwrap().len(),
        coachdesk::services::password::MAX_GENERATED_LENGTH
    );
}

#[tokio::test]
async fn test_cleanup_tokens_endpoint() {
    let app = spawn_app().await;

    let admin = register(&app, "Admin", "sweep@b.com", "Adminpw1!", "admin").await;
    let admin_token = admin["accessToken"].as_str().unwrap();

    let (status, body) = request(
        &app,
        "POST",
        "/api/passwords/cleanup-tokens",
        Some(admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["swept"], 0);
}
