//! # Genera Models
//!
//! Domain models and DTOs for the Genera access-control API.
//!
//! - [`ids`]: typed entity identifiers
//! - [`roles`]: role types, their requirements, and role assignments
//! - [`permissions`]: permission matrix rows, role defaults, and catalog DTOs
//! - [`audit`]: permission audit trail entries
//! - [`profiles`]: user profiles and approval status
//! - [`organizations`]: schools, generations, growth communities, and networks
//! - [`consultants`]: consultants assigned to students or organizations
//! - [`visibility`]: row filters derived from scoped grants
//! - [`auth`]: login and session DTOs
//!
//! # Example
//!
//! ```ignore
//! use genera_models::roles::RoleType;
//! use genera_models::permissions::default_grants;
//!
//! let role: RoleType = "equipo_directivo".parse()?;
//! assert!(default_grants(role).contains(&"view_users_school"));
//! ```

/// Stores a string-backed enum in a Postgres `text` column.
///
/// The type must provide `as_str(&self) -> &'static str` and a `FromStr`
/// implementation.
macro_rules! text_column {
    ($name:ty) => {
        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut <sqlx::Postgres as sqlx::Database>::ArgumentBuffer<'q>,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <&str as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: <sqlx::Postgres as sqlx::Database>::ValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let raw = <&str as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)?;
                Ok(raw.parse::<$name>()?)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub mod audit;
pub mod auth;
pub mod consultants;
pub mod ids;
pub mod organizations;
pub mod permissions;
pub mod profiles;
pub mod roles;
pub mod visibility;

/// A string did not match any variant of a text-backed enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("valor desconocido para {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

pub use ids::{
    AuditEntryId, CommunityId, ConsultantAssignmentId, GenerationId, NetworkId, RoleAssignmentId,
    RolePermissionId, SchoolId, UserId,
};
pub use roles::{RoleAssignment, RoleType};
pub use visibility::Visibility;
