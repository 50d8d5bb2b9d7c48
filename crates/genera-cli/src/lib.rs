//! # Genera CLI
//!
//! Maintenance tooling for the Genera access-control database.
//!
//! - [`admin`]: bootstrap an approved administrator
//! - [`integrity`]: permission matrix and role assignment checks
//! - [`seeder`]: fake schools, communities, and users for demos
//!
//! ## Usage
//!
//! ```ignore
//! use genera_cli::seeder::{DemoConfig, seed_demo};
//!
//! let report = seed_demo(&pool, DemoConfig::new(3)).await?;
//! ```

pub mod admin;
pub mod integrity;
pub mod seeder;
