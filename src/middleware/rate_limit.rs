//! Login rate limiting on top of `tower_governor`.
//!
//! A `GovernorLayer` wraps the login route; [`rate_limited_response`]
//! rewrites the governor's plain-text 429 into the API's JSON error and
//! counts it. The keyed store only grows, so [`spawn_login_limiter_cleanup`]
//! prunes it on an interval.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use genera_config::LoginGovernorConfig;
use genera_core::AppError;

use crate::metrics::{self, AccessEvent};

pub const TOO_MANY_ATTEMPTS_MESSAGE: &str =
    "Demasiados intentos de inicio de sesión. Intenta nuevamente en unos segundos";

/// Maps the governor's 429 to `{"error": ...}`; other responses pass through.
pub async fn rate_limited_response(response: Response) -> Response {
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return response;
    }
    warn!("Login rate limit exceeded");
    metrics::record(AccessEvent::RateLimited { endpoint: "login" });

    let mut rewritten = AppError::too_many_requests(TOO_MANY_ATTEMPTS_MESSAGE).into_response();
    if let Some(retry_after) = response.headers().get("retry-after") {
        rewritten.headers_mut().insert("retry-after", retry_after.clone());
    }
    rewritten
}

/// Drops clients whose bucket has refilled. Returns the keys still tracked.
pub fn prune_login_limiter(config: &LoginGovernorConfig) -> usize {
    let limiter = config.limiter();
    limiter.retain_recent();
    limiter.shrink_to_fit();
    limiter.len()
}

pub fn spawn_login_limiter_cleanup(config: Arc<LoginGovernorConfig>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let tracked = prune_login_limiter(&config);
            debug!(tracked, "Pruned login rate limiter");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    use genera_config::RateLimitConfig;

    fn fast_config() -> LoginGovernorConfig {
        RateLimitConfig {
            auth_per_second: 1000,
            auth_burst_size: 1,
        }
        .auth_governor_config()
        .unwrap()
    }

    #[test]
    fn test_prune_drops_refilled_clients() {
        let config = fast_config();
        for last in 0..50u8 {
            let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, last));
            assert!(config.limiter().check_key(&ip).is_ok());
        }
        assert_eq!(config.limiter().len(), 50);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(prune_login_limiter(&config), 0);
    }

    #[test]
    fn test_prune_keeps_clients_still_limited() {
        let config = RateLimitConfig {
            auth_per_second: 1,
            auth_burst_size: 1,
        }
        .auth_governor_config()
        .unwrap();
        let ip = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 100));
        assert!(config.limiter().check_key(&ip).is_ok());
        assert!(config.limiter().check_key(&ip).is_err());

        assert_eq!(prune_login_limiter(&config), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_response_is_json() {
        let response = StatusCode::TOO_MANY_REQUESTS.into_response();
        let rewritten = rate_limited_response(response).await;
        assert_eq!(rewritten.status(), StatusCode::TOO_MANY_REQUESTS);

        let untouched = rate_limited_response(StatusCode::UNAUTHORIZED.into_response()).await;
        assert_eq!(untouched.status(), StatusCode::UNAUTHORIZED);
    }
}
