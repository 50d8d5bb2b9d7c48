mod common;

use axum::http::StatusCode;
use common::{TEST_PASSWORD, TestApp};
use genera_config::RateLimitConfig;

/// One login attempt per client, refilled slowly.
fn strict_rate_limit_config() -> RateLimitConfig {
    RateLimitConfig {
        auth_per_second: 1,
        auth_burst_size: 1,
    }
}

#[tokio::test]
async fn test_auth_rate_limit_exceeded() {
    let app = TestApp::with_rate_limit(strict_rate_limit_config()).await;

    // Processed normally, so 401 rather than 429.
    let (first, _) = app.login("ana@test.cl", "password123", "192.168.1.100").await;
    assert_eq!(first, StatusCode::UNAUTHORIZED);

    let (second, body) = app.login("ana@test.cl", "password123", "192.168.1.100").await;
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        body["error"],
        "Demasiados intentos de inicio de sesión. Intenta nuevamente en unos segundos"
    );
}

#[tokio::test]
async fn test_rate_limit_is_per_client() {
    let app = TestApp::with_rate_limit(strict_rate_limit_config()).await;
    let admin = app.admin().await;

    let (first, _) = app.login(admin.email(), "wrongpass", "10.1.1.1").await;
    assert_eq!(first, StatusCode::UNAUTHORIZED);
    let (blocked, _) = app.login(admin.email(), TEST_PASSWORD, "10.1.1.1").await;
    assert_eq!(blocked, StatusCode::TOO_MANY_REQUESTS);

    let (other_client, _) = app.login(admin.email(), TEST_PASSWORD, "10.2.2.2").await;
    assert_eq!(other_client, StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_only_guards_login() {
    let app = TestApp::with_rate_limit(strict_rate_limit_config()).await;
    let admin = app.admin().await;

    for _ in 0..5 {
        let (status, _) = app.get("/api/auth/me", &admin.token).await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_disabled_rate_limit_allows_bursts() {
    let app = TestApp::new().await;
    for _ in 0..10 {
        let (status, _) = app.login("ana@test.cl", "password123", "192.168.1.100").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
