//! Request extractors and middleware.
//!
//! - [`auth`]: `AuthUser` (verified bearer token) and `Access` (approved
//!   caller with roles and grants loaded)
//! - [`rate_limit`]: `tower_governor` glue for the login endpoint
//!
//! # Authentication flow
//!
//! 1. Client sends `Authorization: Bearer <token>`
//! 2. `AuthUser` verifies the token signature and expiry
//! 3. `Access` loads the profile, rejects non-approved accounts, and loads
//!    active assignments and effective grants
//! 4. The handler asks `Access` for a decision before calling its service

pub mod auth;
pub mod rate_limit;
