//! # Genera DB
//!
//! Persistence for the Genera access-control API.
//!
//! All reads and writes go through the [`AccessStore`] trait, implemented by
//! [`PgStore`] (Postgres via SQLx) and [`MemoryStore`] (tests and local
//! development without a database).
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use genera_db::{AccessStore, PgStore, init_db_pool, run_migrations};
//!
//! let pool = init_db_pool(&database_url).await?;
//! run_migrations(&pool).await?;
//! let store: Arc<dyn AccessStore> = Arc::new(PgStore::new(pool));
//! ```

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing::info;

pub mod store;

pub use sqlx::PgPool;
pub use store::memory::MemoryStore;
pub use store::postgres::PgStore;
pub use store::{AccessStore, StoreError, StoreResult};

/// Connects a Postgres pool to `database_url`.
///
/// # Errors
///
/// Returns the connection error when the database is unreachable.
pub async fn init_db_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;
    info!(max_connections = 10, "Database pool connected");
    Ok(pool)
}

/// Applies the migrations in `migrations/`.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}
