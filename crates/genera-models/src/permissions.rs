//! Permission matrix rows and per-role defaults.
//!
//! `role_permissions` holds one or more rows per (role type, permission key).
//! A row grants only while it is active, not a test row, `granted`, and not
//! past `expires_at`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use genera_core::permissions::{self as catalog, PermissionKey, Scope};
use genera_core::serde::deserialize_optional_bool;

use crate::ids::{RolePermissionId, UserId};
use crate::roles::RoleType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RolePermission {
    pub id: RolePermissionId,
    pub role_type: RoleType,
    pub permission_key: String,
    pub granted: bool,
    pub is_test: bool,
    pub active: bool,
    pub reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: Option<UserId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub test_run_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RolePermission {
    /// Whether this row counts towards effective permissions at `now`.
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.active && !self.is_test && self.granted && self.expires_at.is_none_or(|at| at > now)
    }
}

/// Store input for a seeded row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionSeed {
    pub role_type: RoleType,
    pub permission_key: String,
    pub granted: bool,
}

/// Store input for a matrix edit made through the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionChange {
    pub role_type: RoleType,
    pub permission_key: String,
    pub granted: bool,
    pub reason: Option<String>,
    pub performed_by: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PermissionChangeOutcome {
    pub permission: RolePermission,
    /// Value before the change; absent when the row was created.
    pub previous: Option<bool>,
    pub changed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SeedReport {
    pub inserted: u64,
    pub existing: u64,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdatePermissionDto {
    pub granted: bool,
    #[validate(length(max = 500, message = "El motivo no puede superar 500 caracteres"))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct MatrixFilterParams {
    pub role_type: Option<RoleType>,
    pub permission_key: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_bool")]
    pub include_test: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PermissionCheckParams {
    pub permission_key: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PermissionCheckResponse {
    pub permission_key: String,
    pub allowed: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CatalogEntry {
    pub key: String,
    pub base: String,
    pub scope: Option<Scope>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CatalogCategory {
    pub category: &'static str,
    pub permissions: Vec<CatalogEntry>,
}

fn entry(key: String) -> CatalogEntry {
    let parsed = PermissionKey::parse(&key);
    CatalogEntry {
        base: parsed.base.to_string(),
        scope: parsed.scope,
        key: key.clone(),
    }
}

/// The permission catalog grouped by category, unscoped keys first.
pub fn catalog_by_category() -> Vec<CatalogCategory> {
    let mut categories = vec![CatalogCategory {
        category: catalog::UNSCOPED_CATEGORY,
        permissions: catalog::UNSCOPED
            .iter()
            .map(|k| entry(k.to_string()))
            .collect(),
    }];
    for group in catalog::GROUPS {
        let permissions = group
            .permissions
            .iter()
            .flat_map(|p| p.scopes.iter().map(|s| catalog::scoped_key(p.base, *s)))
            .map(entry)
            .collect();
        categories.push(CatalogCategory {
            category: group.category,
            permissions,
        });
    }
    categories
}

const CONSULTOR: &[&str] = &[
    "view_dashboard",
    "view_reports_all",
    "view_learning_paths_all",
    "view_courses_all",
    "view_news_all",
    "view_events_all",
    "view_users_network",
    "view_schools_network",
    "view_consultants_all",
    "view_expense_reports_all",
    "view_cash_flow_all",
    "view_contracts_all",
    "view_internship_proposals_all",
];

const EQUIPO_DIRECTIVO: &[&str] = &[
    "view_dashboard",
    "view_reports_school",
    "view_learning_paths_school",
    "create_learning_paths_school",
    "edit_learning_paths_school",
    "view_courses_school",
    "create_courses_school",
    "edit_courses_school",
    "view_news_all",
    "create_news_all",
    "edit_news_school",
    "publish_news_school",
    "view_events_all",
    "create_events_school",
    "edit_events_school",
    "view_users_school",
    "create_users_school",
    "edit_users_school",
    "view_schools_all",
    "edit_schools_own",
    "manage_generations_school",
    "manage_communities_school",
    "view_expense_reports_school",
    "create_expense_reports_school",
    "edit_expense_reports_school",
    "approve_expense_reports_school",
    "view_cash_flow_school",
    "view_contracts_school",
    "create_contracts_school",
    "edit_contracts_school",
    "view_internship_proposals_school",
    "create_internship_proposals_school",
    "edit_internship_proposals_school",
    "approve_internship_proposals_school",
    "view_workspace_school",
    "create_workspace_content_school",
    "manage_group_assignments_school",
];

const COMMUNITY_MANAGER: &[&str] = &[
    "view_dashboard",
    "view_news_all",
    "create_news_all",
    "edit_news_own",
    "delete_news_own",
    "publish_news_own",
    "view_events_all",
    "create_events_school",
    "edit_events_own",
    "view_expense_reports_own",
    "create_expense_reports_own",
    "edit_expense_reports_own",
    "view_workspace_own",
    "edit_workspace_content_own",
];

const SUPERVISOR_DE_RED: &[&str] = &[
    "view_dashboard",
    "view_reports_network",
    "supervise_network_schools",
    "view_users_network",
    "view_schools_network",
    "edit_schools_network",
    "view_expense_reports_all",
    "view_cash_flow_all",
    "view_contracts_all",
];

const LIDER_GENERACION: &[&str] = &[
    "view_dashboard",
    "view_reports_generation",
    "view_learning_paths_school",
    "view_courses_school",
    "view_news_all",
    "view_events_all",
    "view_users_school",
    "manage_generations_school",
    "view_workspace_school",
    "create_workspace_content_school",
    "edit_workspace_content_own",
    "manage_group_assignments_school",
];

const LIDER_COMUNIDAD: &[&str] = &[
    "view_dashboard",
    "view_reports_community",
    "view_learning_paths_school",
    "view_courses_school",
    "view_news_all",
    "view_events_all",
    "view_users_school",
    "manage_communities_school",
    "view_workspace_school",
    "create_workspace_content_school",
    "edit_workspace_content_own",
];

const DOCENTE: &[&str] = &[
    "view_dashboard",
    "view_learning_paths_own",
    "view_courses_own",
    "view_news_all",
    "view_events_all",
    "view_users_own",
    "view_workspace_own",
    "edit_workspace_content_own",
    "manage_group_assignments_school",
];

const ESTUDIANTE: &[&str] = &[
    "view_dashboard",
    "view_learning_paths_own",
    "view_courses_own",
    "view_news_all",
    "view_events_all",
    "view_users_own",
    "view_workspace_own",
];

/// Keys granted to `role` by default. Admin is granted the whole catalog and
/// returns an empty slice here; use [`is_granted_by_default`].
pub fn default_grants(role: RoleType) -> &'static [&'static str] {
    match role {
        RoleType::Admin => &[],
        RoleType::Consultor => CONSULTOR,
        RoleType::EquipoDirectivo => EQUIPO_DIRECTIVO,
        RoleType::LiderGeneracion => LIDER_GENERACION,
        RoleType::LiderComunidad => LIDER_COMUNIDAD,
        RoleType::SupervisorDeRed => SUPERVISOR_DE_RED,
        RoleType::CommunityManager => COMMUNITY_MANAGER,
        RoleType::Docente => DOCENTE,
        RoleType::Estudiante => ESTUDIANTE,
    }
}

pub fn is_granted_by_default(role: RoleType, key: &str) -> bool {
    match role {
        RoleType::Admin => catalog::is_known(key),
        other => default_grants(other).contains(&key),
    }
}

/// One row per role type × catalog key, with the default `granted` value.
pub fn default_matrix() -> Vec<PermissionSeed> {
    let keys = catalog::all_keys();
    RoleType::ALL
        .into_iter()
        .flat_map(|role| {
            keys.iter().map(move |key| PermissionSeed {
                role_type: role,
                permission_key: key.clone(),
                granted: is_granted_by_default(role, key),
            })
        })
        .collect()
}
