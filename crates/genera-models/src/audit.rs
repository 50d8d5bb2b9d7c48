//! Permission audit trail.
//!
//! Entries are written in the same transaction as the change they record and
//! are never updated or deleted afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use genera_core::serde::deserialize_optional_uuid;
use genera_core::{PaginationMeta, PaginationParams};

use crate::UnknownVariant;
use crate::ids::{AuditEntryId, UserId};
use crate::roles::RoleType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    PermissionCreated,
    PermissionGranted,
    PermissionRevoked,
    RoleAssigned,
    RoleRemoved,
    ApprovalChanged,
}

impl AuditAction {
    pub const ALL: [AuditAction; 6] = [
        AuditAction::PermissionCreated,
        AuditAction::PermissionGranted,
        AuditAction::PermissionRevoked,
        AuditAction::RoleAssigned,
        AuditAction::RoleRemoved,
        AuditAction::ApprovalChanged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::PermissionCreated => "permission_created",
            AuditAction::PermissionGranted => "permission_granted",
            AuditAction::PermissionRevoked => "permission_revoked",
            AuditAction::RoleAssigned => "role_assigned",
            AuditAction::RoleRemoved => "role_removed",
            AuditAction::ApprovalChanged => "approval_changed",
        }
    }

    /// Action recorded for a matrix write, given the previous value.
    pub fn for_permission_change(previous: Option<bool>, granted: bool) -> Self {
        match (previous, granted) {
            (None, _) => AuditAction::PermissionCreated,
            (Some(_), true) => AuditAction::PermissionGranted,
            (Some(_), false) => AuditAction::PermissionRevoked,
        }
    }
}

impl FromStr for AuditAction {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "action",
                value: s.to_string(),
            })
    }
}

text_column!(AuditAction);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub action: AuditAction,
    pub role_type: Option<RoleType>,
    pub permission_key: Option<String>,
    /// Subject of role and approval changes.
    pub user_id: Option<UserId>,
    #[schema(value_type = Option<Object>)]
    pub old_value: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub new_value: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub diff: Option<Value>,
    pub reason: Option<String>,
    pub performed_by: Option<UserId>,
    pub is_test: bool,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub test_run_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Store input for an audit entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub action: AuditAction,
    pub role_type: Option<RoleType>,
    pub permission_key: Option<String>,
    pub user_id: Option<UserId>,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub diff: Option<Value>,
    pub reason: Option<String>,
    pub performed_by: Option<UserId>,
}

impl NewAuditEntry {
    pub fn new(action: AuditAction) -> Self {
        Self {
            action,
            role_type: None,
            permission_key: None,
            user_id: None,
            old_value: None,
            new_value: None,
            diff: None,
            reason: None,
            performed_by: None,
        }
    }

    pub fn role_type(mut self, role_type: RoleType) -> Self {
        self.role_type = Some(role_type);
        self
    }

    pub fn permission_key(mut self, key: impl Into<String>) -> Self {
        self.permission_key = Some(key.into());
        self
    }

    pub fn user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Records both values and a `{"from", "to"}` diff.
    pub fn values(mut self, old: Option<Value>, new: Value) -> Self {
        self.diff = Some(serde_json::json!({ "from": old.clone(), "to": new.clone() }));
        self.old_value = old;
        self.new_value = Some(new);
        self
    }

    pub fn reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    pub fn performed_by(mut self, user_id: Option<UserId>) -> Self {
        self.performed_by = user_id;
        self
    }

    /// Materializes the entry with a fresh id, for stores that build rows in
    /// memory.
    pub fn into_entry(self, created_at: DateTime<Utc>) -> AuditEntry {
        AuditEntry {
            id: AuditEntryId::new(),
            action: self.action,
            role_type: self.role_type,
            permission_key: self.permission_key,
            user_id: self.user_id,
            old_value: self.old_value,
            new_value: self.new_value,
            diff: self.diff,
            reason: self.reason,
            performed_by: self.performed_by,
            is_test: false,
            test_run_id: None,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AuditFilterParams {
    pub action: Option<AuditAction>,
    pub role_type: Option<RoleType>,
    pub permission_key: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub user_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub performed_by: Option<Uuid>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

impl AuditFilterParams {
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.action.is_none_or(|a| a == entry.action)
            && self.role_type.is_none_or(|r| Some(r) == entry.role_type)
            && self
                .permission_key
                .as_deref()
                .is_none_or(|k| entry.permission_key.as_deref() == Some(k))
            && self
                .user_id
                .is_none_or(|u| entry.user_id.map(UserId::into_inner) == Some(u))
            && self
                .performed_by
                .is_none_or(|u| entry.performed_by.map(UserId::into_inner) == Some(u))
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginatedAuditResponse {
    pub data: Vec<AuditEntry>,
    pub meta: PaginationMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names() {
        for action in AuditAction::ALL {
            assert_eq!(action.as_str().parse::<AuditAction>().unwrap(), action);
        }
        assert!("permission_deleted".parse::<AuditAction>().is_err());
    }

    #[test]
    fn test_action_for_permission_change() {
        assert_eq!(
            AuditAction::for_permission_change(None, false),
            AuditAction::PermissionCreated
        );
        assert_eq!(
            AuditAction::for_permission_change(Some(false), true),
            AuditAction::PermissionGranted
        );
        assert_eq!(
            AuditAction::for_permission_change(Some(true), false),
            AuditAction::PermissionRevoked
        );
    }

    #[test]
    fn test_builder_records_diff() {
        let entry = NewAuditEntry::new(AuditAction::PermissionGranted)
            .role_type(RoleType::Docente)
            .permission_key("view_users_school")
            .values(Some(Value::Bool(false)), Value::Bool(true))
            .into_entry(Utc::now());

        assert_eq!(entry.role_type, Some(RoleType::Docente));
        assert_eq!(entry.diff, Some(serde_json::json!({"from": false, "to": true})));
        assert!(!entry.is_test);
    }

    #[test]
    fn test_filter_matches() {
        let user = UserId::new();
        let entry = NewAuditEntry::new(AuditAction::RoleAssigned)
            .role_type(RoleType::Admin)
            .user(user)
            .into_entry(Utc::now());

        let all = AuditFilterParams::default();
        assert!(all.matches(&entry));

        let by_user = AuditFilterParams {
            user_id: Some(user.into_inner()),
            ..Default::default()
        };
        assert!(by_user.matches(&entry));

        let by_action = AuditFilterParams {
            action: Some(AuditAction::RoleRemoved),
            ..Default::default()
        };
        assert!(!by_action.matches(&entry));

        let by_key = AuditFilterParams {
            permission_key: Some("manage_permissions".into()),
            ..Default::default()
        };
        assert!(!by_key.matches(&entry));
    }
}
