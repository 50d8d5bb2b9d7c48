//! # Genera Auth
//!
//! Bearer token support for the Genera access-control API.
//!
//! - [`claims`]: access token claims
//! - [`jwt`]: token creation and verification
//!
//! Tokens carry identity only. Roles and permissions are looked up on every
//! request so that a revoked grant or a deactivated role takes effect
//! immediately instead of when the token expires.
//!
//! # Example
//!
//! ```ignore
//! use genera_auth::{create_access_token, verify_token};
//! use genera_config::JwtConfig;
//!
//! let config = JwtConfig::from_env();
//! let token = create_access_token(user_id, "directora@colegio.cl", &config)?;
//! let claims = verify_token(&token, &config)?;
//! assert_eq!(claims.user_id()?, user_id);
//! ```

pub mod claims;
pub mod jwt;

pub use claims::Claims;
pub use jwt::{create_access_token, verify_token};
