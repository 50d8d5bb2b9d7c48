//! User profiles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use genera_core::serde::deserialize_optional_uuid;
use genera_core::{PaginationMeta, PaginationParams};

use crate::UnknownVariant;
use crate::ids::{CommunityId, GenerationId, SchoolId, UserId};
use crate::roles::{DataScope, RoleAssignment, RoleType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Disabled,
}

impl ApprovalStatus {
    pub const ALL: [ApprovalStatus; 4] = [
        ApprovalStatus::Pending,
        ApprovalStatus::Approved,
        ApprovalStatus::Rejected,
        ApprovalStatus::Disabled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::Disabled => "disabled",
        }
    }

    /// Message returned to a user whose account may not be used.
    pub fn denial_message(&self) -> Option<&'static str> {
        match self {
            ApprovalStatus::Approved => None,
            ApprovalStatus::Pending => Some("Tu cuenta está pendiente de aprobación"),
            ApprovalStatus::Rejected => Some("Tu cuenta fue rechazada"),
            ApprovalStatus::Disabled => Some("Tu cuenta está deshabilitada"),
        }
    }
}

impl FromStr for ApprovalStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApprovalStatus::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "approval_status",
                value: s.to_string(),
            })
    }
}

text_column!(ApprovalStatus);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Profile {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub school_id: Option<SchoolId>,
    pub generation_id: Option<GenerationId>,
    pub community_id: Option<CommunityId>,
    pub approval_status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_approved(&self) -> bool {
        self.approval_status == ApprovalStatus::Approved
    }
}

/// Profile plus its password hash. Never serialized.
#[derive(Debug, Clone, FromRow)]
pub struct ProfileCredentials {
    #[sqlx(flatten)]
    pub profile: Profile,
    pub password_hash: String,
}

/// Store input for a new profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfile {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub school_id: Option<SchoolId>,
    pub generation_id: Option<GenerationId>,
    pub community_id: Option<CommunityId>,
    pub approval_status: ApprovalStatus,
}

/// Partial update; `None` leaves a column unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub school_id: Option<SchoolId>,
    pub generation_id: Option<GenerationId>,
    pub community_id: Option<CommunityId>,
}

impl ProfileUpdate {
    pub fn apply(&self, profile: &mut Profile) {
        if let Some(first_name) = &self.first_name {
            profile.first_name = first_name.clone();
        }
        if let Some(last_name) = &self.last_name {
            profile.last_name = last_name.clone();
        }
        if let Some(school_id) = self.school_id {
            profile.school_id = Some(school_id);
        }
        if let Some(generation_id) = self.generation_id {
            profile.generation_id = Some(generation_id);
        }
        if let Some(community_id) = self.community_id {
            profile.community_id = Some(community_id);
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateUserDto {
    #[validate(email(message = "Correo electrónico inválido"))]
    pub email: String,
    #[validate(length(min = 1, message = "El nombre es obligatorio"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "El apellido es obligatorio"))]
    pub last_name: String,
    #[validate(length(min = 8, message = "La contraseña debe tener al menos 8 caracteres"))]
    pub password: String,
    pub school_id: Option<SchoolId>,
    pub generation_id: Option<GenerationId>,
    pub community_id: Option<CommunityId>,
    /// Defaults to `approved` for accounts created by staff.
    pub approval_status: Option<ApprovalStatus>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserDto {
    #[validate(length(min = 1, message = "El nombre es obligatorio"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, message = "El apellido es obligatorio"))]
    pub last_name: Option<String>,
    pub school_id: Option<SchoolId>,
    pub generation_id: Option<GenerationId>,
    pub community_id: Option<CommunityId>,
}

impl From<UpdateUserDto> for ProfileUpdate {
    fn from(dto: UpdateUserDto) -> Self {
        Self {
            first_name: dto.first_name,
            last_name: dto.last_name,
            school_id: dto.school_id,
            generation_id: dto.generation_id,
            community_id: dto.community_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateApprovalDto {
    pub approval_status: ApprovalStatus,
    #[validate(length(max = 500, message = "El motivo no puede superar 500 caracteres"))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ProfileFilterParams {
    /// Case-insensitive match on email, first name, or last name.
    pub search: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub school_id: Option<Uuid>,
    pub approval_status: Option<ApprovalStatus>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

impl ProfileFilterParams {
    pub fn matches(&self, profile: &Profile) -> bool {
        let search = self.search.as_deref().map(str::to_lowercase);
        search.as_deref().is_none_or(|needle| {
            profile.email.to_lowercase().contains(needle)
                || profile.first_name.to_lowercase().contains(needle)
                || profile.last_name.to_lowercase().contains(needle)
        }) && self
            .school_id
            .is_none_or(|s| profile.school_id.map(SchoolId::into_inner) == Some(s))
            && self
                .approval_status
                .is_none_or(|s| profile.approval_status == s)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginatedProfilesResponse {
    pub data: Vec<Profile>,
    pub meta: PaginationMeta,
}

/// A profile with its active role assignments.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProfileWithRoles {
    #[serde(flatten)]
    pub profile: Profile,
    pub roles: Vec<RoleAssignment>,
    pub highest_role: Option<RoleType>,
    pub data_scope: Option<DataScope>,
}

impl ProfileWithRoles {
    pub fn new(profile: Profile, roles: Vec<RoleAssignment>) -> Self {
        let highest_role = RoleType::highest(roles.iter().filter(|r| r.is_active).map(|r| r.role_type));
        let data_scope = DataScope::resolve(profile.id, &roles);
        Self {
            profile,
            roles,
            highest_role,
            data_scope,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        Profile {
            id: UserId::new(),
            email: "ana.perez@colegio.cl".into(),
            first_name: "Ana".into(),
            last_name: "Pérez".into(),
            school_id: Some(SchoolId::from_u128(1)),
            generation_id: None,
            community_id: None,
            approval_status: ApprovalStatus::Approved,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_only_approved_accounts_are_usable() {
        assert!(ApprovalStatus::Approved.denial_message().is_none());
        for status in [
            ApprovalStatus::Pending,
            ApprovalStatus::Rejected,
            ApprovalStatus::Disabled,
        ] {
            assert!(status.denial_message().is_some());
        }
    }

    #[test]
    fn test_approval_status_names() {
        for status in ApprovalStatus::ALL {
            assert_eq!(status.as_str().parse::<ApprovalStatus>().unwrap(), status);
        }
        assert_eq!(ApprovalStatus::default(), ApprovalStatus::Pending);
    }

    #[test]
    fn test_update_applies_only_present_fields() {
        let mut p = profile();
        ProfileUpdate {
            first_name: Some("Ana María".into()),
            ..Default::default()
        }
        .apply(&mut p);

        assert_eq!(p.first_name, "Ana María");
        assert_eq!(p.last_name, "Pérez");
        assert_eq!(p.school_id, Some(SchoolId::from_u128(1)));
        assert_eq!(p.approval_status, ApprovalStatus::Approved);
    }

    #[test]
    fn test_filter_search_is_case_insensitive() {
        let p = profile();
        let filter = ProfileFilterParams {
            search: Some("PÉREZ".into()),
            ..Default::default()
        };
        assert!(filter.matches(&p));

        let filter = ProfileFilterParams {
            school_id: Some(Uuid::from_u128(2)),
            ..Default::default()
        };
        assert!(!filter.matches(&p));
    }

    #[test]
    fn test_create_user_validation() {
        let dto = CreateUserDto {
            email: "no-es-correo".into(),
            first_name: "Ana".into(),
            last_name: "Pérez".into(),
            password: "corta".into(),
            school_id: None,
            generation_id: None,
            community_id: None,
            approval_status: None,
        };
        let errors = dto.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn test_profile_serialization_has_no_password() {
        let json = serde_json::to_value(profile()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["approval_status"], "approved");
    }
}
