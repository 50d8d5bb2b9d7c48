//! Prometheus metrics: HTTP request counters and access-control events.

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
    routing::get,
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

const REQUEST_DURATION: &str = "http_request_duration_seconds";
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

static ENABLED: OnceLock<bool> = OnceLock::new();

/// `OBSERVABILITY_ENABLED` unless set to `false` or `0`. Read once.
pub fn is_observability_enabled() -> bool {
    *ENABLED.get_or_init(|| {
        std::env::var("OBSERVABILITY_ENABLED")
            .map(|v| !(v.eq_ignore_ascii_case("false") || v == "0"))
            .unwrap_or(true)
    })
}

/// Installs the Prometheus recorder and spawns its upkeep loop.
/// `Ok(None)` when observability is disabled.
pub fn init_metrics() -> Result<Option<PrometheusHandle>, BuildError> {
    if !is_observability_enabled() {
        return Ok(None);
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_string()), LATENCY_BUCKETS)?
        .install_recorder()?;

    let upkeep = handle.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            interval.tick().await;
            upkeep.run_upkeep();
        }
    });

    Ok(Some(handle))
}

pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    if !is_observability_enabled() {
        return next.run(req).await;
    }

    let started = Instant::now();
    let method = req.method().to_string();
    let path = match req.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_owned(),
        None => req.uri().path().to_owned(),
    };

    let active = gauge!("http_requests_active");
    active.increment(1.0);
    let response = next.run(req).await;
    active.decrement(1.0);

    let status = response.status().as_u16().to_string();
    counter!("http_requests_total", "method" => method.clone(), "path" => path.clone(), "status" => status)
        .increment(1);
    histogram!(REQUEST_DURATION, "method" => method, "path" => path)
        .record(started.elapsed().as_secs_f64());

    response
}

pub fn metrics_app(handle: PrometheusHandle) -> Router {
    Router::new().route("/metrics", get(move || async move { handle.render() }))
}

/// Access-control events counted by [`record`].
#[derive(Debug, Clone, Copy)]
pub enum AccessEvent<'a> {
    LoginSucceeded,
    LoginFailed { reason: &'static str },
    TokenIssued,
    TokenAccepted,
    AuthorizationChecked { key: &'a str, allowed: bool },
    PermissionChanged { granted: bool },
    RoleAssigned { role: &'static str },
    RoleRemoved { role: &'static str },
    ConsultantAssigned { scope: &'static str },
    ConsultantUnassigned { scope: &'static str },
    UserCreated,
    SchoolCreated,
    RateLimited { endpoint: &'static str },
}

pub fn record(event: AccessEvent<'_>) {
    if !is_observability_enabled() {
        return;
    }
    match event {
        AccessEvent::LoginSucceeded => {
            counter!("user_logins_total", "status" => "success").increment(1)
        }
        AccessEvent::LoginFailed { reason } => {
            counter!("user_logins_total", "status" => "failure", "reason" => reason).increment(1)
        }
        AccessEvent::TokenIssued => counter!("jwt_tokens_issued_total").increment(1),
        AccessEvent::TokenAccepted => {
            counter!("jwt_validations_total", "status" => "valid").increment(1)
        }
        AccessEvent::AuthorizationChecked { key, allowed } => counter!(
            "authorization_checks_total",
            "permission" => key.to_string(),
            "status" => if allowed { "allowed" } else { "denied" }
        )
        .increment(1),
        AccessEvent::PermissionChanged { granted } => counter!(
            "permission_changes_total",
            "action" => if granted { "granted" } else { "revoked" }
        )
        .increment(1),
        AccessEvent::RoleAssigned { role } => {
            counter!("role_assignments_total", "role" => role, "operation" => "assigned")
                .increment(1)
        }
        AccessEvent::RoleRemoved { role } => {
            counter!("role_assignments_total", "role" => role, "operation" => "removed")
                .increment(1)
        }
        AccessEvent::ConsultantAssigned { scope } => counter!(
            "consultant_assignments_total",
            "scope" => scope,
            "operation" => "assigned"
        )
        .increment(1),
        AccessEvent::ConsultantUnassigned { scope } => counter!(
            "consultant_assignments_total",
            "scope" => scope,
            "operation" => "removed"
        )
        .increment(1),
        AccessEvent::UserCreated => counter!("users_created_total").increment(1),
        AccessEvent::SchoolCreated => counter!("schools_created_total").increment(1),
        AccessEvent::RateLimited { endpoint } => {
            counter!("rate_limited_requests_total", "endpoint" => endpoint).increment(1)
        }
    }
}
