use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use genera_config::{CorsConfig, JwtConfig, LoginGovernorConfig, RateLimitConfig};
use genera_db::{AccessStore, MemoryStore, PgStore, init_db_pool, run_migrations};
use genera_models::permissions::default_matrix;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AccessStore>,
    pub jwt_config: JwtConfig,
    pub cors_config: CorsConfig,
    pub rate_limit_config: RateLimitConfig,
    /// Shared with the login route layer and its cleanup task.
    pub login_governor: Option<Arc<LoginGovernorConfig>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn AccessStore>,
        jwt_config: JwtConfig,
        cors_config: CorsConfig,
        rate_limit_config: RateLimitConfig,
    ) -> Self {
        let login_governor = rate_limit_config.auth_governor_config().map(Arc::new);
        Self {
            store,
            jwt_config,
            cors_config,
            rate_limit_config,
            login_governor,
        }
    }

    pub fn store(&self) -> &dyn AccessStore {
        self.store.as_ref()
    }

    /// State over `store` with a fixed signing secret and login limiting
    /// set by `rate_limit_config`.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_tests(store: Arc<dyn AccessStore>, rate_limit_config: RateLimitConfig) -> Self {
        Self::new(
            store,
            JwtConfig::with_secret("test-secret-for-genera"),
            CorsConfig::from_list("http://localhost:3000"),
            rate_limit_config,
        )
    }
}

/// Connects the store named by `DATABASE_URL` (in-memory when unset), applies
/// migrations, and seeds the default permission matrix.
pub async fn init_app_state() -> anyhow::Result<AppState> {
    let store: Arc<dyn AccessStore> = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => {
            let pool = init_db_pool(&url)
                .await
                .context("failed to connect to the database")?;
            run_migrations(&pool)
                .await
                .context("failed to apply migrations")?;
            Arc::new(PgStore::new(pool))
        }
        _ => {
            warn!("DATABASE_URL is not set; using the in-memory store, data will not persist");
            Arc::new(MemoryStore::new())
        }
    };

    let report = store
        .seed_permissions(&default_matrix(), None)
        .await
        .context("failed to seed the permission matrix")?;
    info!(
        backend = store.backend_name(),
        inserted = report.inserted,
        existing = report.existing,
        "Permission matrix seeded"
    );

    Ok(AppState::new(
        store,
        JwtConfig::from_env(),
        CorsConfig::from_env(),
        RateLimitConfig::from_env(),
    ))
}
