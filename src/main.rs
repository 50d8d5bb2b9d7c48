use std::net::SocketAddr;
use std::time::Duration;

use dotenvy::dotenv;
use tracing::{error, info, warn};

use genera::logging::{init_tracing, shutdown_tracer};
use genera::metrics::{init_metrics, metrics_app};
use genera::middleware::rate_limit::spawn_login_limiter_cleanup;
use genera::router::init_router;
use genera::state::init_app_state;

fn port_from_env(name: &str, default: u16) -> u16 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

fn serve_metrics(port: u16) {
    let handle = match init_metrics() {
        Ok(Some(handle)) => handle,
        Ok(None) => {
            info!("Observability disabled; metrics server not started");
            return;
        }
        Err(e) => {
            warn!(error = %e, "Failed to install the Prometheus recorder");
            return;
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tokio::spawn(async move {
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => {
                info!(%addr, "Metrics available at /metrics");
                if let Err(e) = axum::serve(listener, metrics_app(handle)).await {
                    error!(error = %e, "Metrics server stopped");
                }
            }
            Err(e) => error!(error = %e, %addr, "Failed to bind the metrics server"),
        }
    });
}

async fn run() -> anyhow::Result<()> {
    serve_metrics(port_from_env("METRICS_PORT", 9090));

    let state = init_app_state().await?;
    if let Some(governor) = state.login_governor.clone() {
        spawn_login_limiter_cleanup(governor, Duration::from_secs(60));
    }
    let app = init_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port_from_env("PORT", 3000)));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Server running");
    info!("Swagger UI available at http://{addr}/swagger-ui");
    info!("Scalar UI available at http://{addr}/scalar");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_tracing();

    let result = run().await;
    if let Err(e) = &result {
        error!(error = ?e, "Server exited with an error");
    }
    shutdown_tracer();

    if result.is_err() {
        std::process::exit(1);
    }
}
