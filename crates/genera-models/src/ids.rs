//! Typed identifiers.
//!
//! Every entity id is a `Uuid` wrapped in its own newtype so that a
//! `SchoolId` can never be passed where a `CommunityId` is expected. The
//! wrappers are transparent on the wire (a plain UUID string) and in Postgres
//! (a `uuid` column).

use serde::{Deserialize, Serialize};
use sqlx::{
    Database, Decode, Encode, Type,
    postgres::{PgHasArrayType, PgTypeInfo},
};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
        #[serde(transparent)]
        #[schema(value_type = String, format = "uuid")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Fresh random (v4) id.
            #[inline]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Fixed id, for seeds and tests.
            #[inline]
            pub const fn from_u128(v: u128) -> Self {
                Self(Uuid::from_u128(v))
            }

            #[inline]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }

            #[inline]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $name {
            #[inline]
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            #[inline]
            fn from(id: $name) -> Uuid {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl Type<sqlx::Postgres> for $name {
            fn type_info() -> PgTypeInfo {
                <Uuid as Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &PgTypeInfo) -> bool {
                <Uuid as Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'q> Encode<'q, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut <sqlx::Postgres as Database>::ArgumentBuffer<'q>,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <Uuid as Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }

        impl<'r> Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: <sqlx::Postgres as Database>::ValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                <Uuid as Decode<'r, sqlx::Postgres>>::decode(value).map(Self)
            }
        }

        impl PgHasArrayType for $name {
            fn array_type_info() -> PgTypeInfo {
                <Uuid as PgHasArrayType>::array_type_info()
            }
        }
    };
}

define_id!(
    /// Profile (user account) id.
    UserId
);

define_id!(SchoolId);

define_id!(GenerationId);

define_id!(
    /// Growth community id.
    CommunityId
);

define_id!(
    /// School network id.
    NetworkId
);

define_id!(
    /// Row id in `user_roles`.
    RoleAssignmentId
);

define_id!(
    /// Row id in `consultant_assignments`.
    ConsultantAssignmentId
);

define_id!(
    /// Row id in `role_permissions`.
    RolePermissionId
);

define_id!(
    /// Row id in `permission_audit_log`.
    AuditEntryId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_new_ids_are_unique() {
        assert_ne!(UserId::new(), UserId::new());
    }

    #[test]
    fn test_serializes_as_plain_uuid() {
        let uuid = Uuid::new_v4();
        let id = SchoolId::from(uuid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));

        let back: SchoolId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_display_and_debug() {
        let id = NetworkId::from_u128(1);
        assert_eq!(id.to_string(), "00000000-0000-0000-0000-000000000001");
        assert!(format!("{:?}", id).starts_with("NetworkId("));
    }

    #[test]
    fn test_from_str() {
        let id: CommunityId = "00000000-0000-0000-0000-00000000000a".parse().unwrap();
        assert_eq!(id, CommunityId::from_u128(10));
        assert!("nope".parse::<CommunityId>().is_err());
    }

    #[test]
    fn test_ordering_is_uuid_ordering() {
        let set: BTreeSet<_> = [UserId::from_u128(3), UserId::from_u128(1), UserId::from_u128(2)]
            .into_iter()
            .collect();
        let ordered: Vec<_> = set.into_iter().map(UserId::into_inner).collect();
        assert_eq!(
            ordered,
            vec![Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3)]
        );
    }
}
