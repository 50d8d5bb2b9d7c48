//! # Genera Core
//!
//! Core types, errors, and utilities for the Genera access-control API.
//!
//! - [`errors`]: Application error type with HTTP response conversion
//! - [`pagination`]: Pagination utilities for API responses
//! - [`password`]: Password hashing and verification
//! - [`permissions`]: The scoped permission catalog and scope ranking
//! - [`serde`]: Custom serde deserialization helpers
//!
//! # Example
//!
//! ```ignore
//! use genera_core::errors::AppError;
//! use genera_core::permissions::{PermissionKey, Scope};
//!
//! let key = PermissionKey::parse("view_users_school");
//! assert_eq!(key.scope(), Some(Scope::School));
//!
//! let error = AppError::forbidden("No tienes permiso para realizar esta acción");
//! ```

pub mod errors;
pub mod pagination;
pub mod password;
pub mod permissions;
pub mod serde;

pub use errors::AppError;
pub use pagination::{PaginationMeta, PaginationParams};
pub use password::{hash_password, verify_password};
pub use permissions::{PermissionKey, Scope};
