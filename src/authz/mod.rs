//! Authorization decisions.
//!
//! Handlers state what they need (a permission key, a permission base on a
//! resource, or a set of role types) and [`AccessContext`] decides. Two
//! questions are answered:
//!
//! 1. Permission check: does any active role of the caller hold an effective
//!    grant of the key, directly or through a wider scope of the same base?
//! 2. Scope enforcement: does one of those grants reach the target resource?
//!    `_school` grants reach the assignment's school, `_network` grants the
//!    member schools of the assignment's networks, `_all` everything.
//!
//! ```ignore
//! let scope = access.authorize(permissions::EDIT_USERS, &ResourceScope::profile(&target))?;
//! ```

pub mod context;
pub mod resource;

pub use context::AccessContext;
pub use resource::ResourceScope;

pub const NO_PERMISSION_MESSAGE: &str = "No tienes permiso para realizar esta acción";
pub const OUT_OF_SCOPE_MESSAGE: &str = "No tienes acceso a recursos fuera de tu ámbito";
