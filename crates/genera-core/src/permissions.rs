//! Permission catalog and scope conventions.
//!
//! A permission key is a plain string such as `view_users_school`. Most keys
//! end with a scope suffix that says how far the action reaches:
//!
//! | suffix        | reach                                             |
//! |---------------|---------------------------------------------------|
//! | `_own`        | records owned by the caller                       |
//! | `_community`  | the caller's growth community                     |
//! | `_generation` | the caller's generation                           |
//! | `_school`     | the caller's school                               |
//! | `_network`    | every school of the caller's school network       |
//! | `_all`        | everything                                        |
//!
//! Keys without one of these suffixes (`manage_permissions`, ...) are
//! unscoped. Scopes are ranked in the order above; holding a key implies
//! holding the same base at every lower rank, so `view_users_all` implies
//! `view_users_school` and `view_users_own`.
//!
//! # Example
//!
//! ```ignore
//! use genera_core::permissions::{self, PermissionKey, Scope};
//!
//! let key = PermissionKey::parse("view_users_network");
//! assert_eq!(key.base, permissions::VIEW_USERS);
//! assert!(Scope::All.implies(Scope::Network));
//! ```

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Own,
    Community,
    Generation,
    School,
    Network,
    All,
}

impl Scope {
    /// Every scope, lowest rank first.
    pub const ORDERED: [Scope; 6] = [
        Scope::Own,
        Scope::Community,
        Scope::Generation,
        Scope::School,
        Scope::Network,
        Scope::All,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            Scope::Own => "own",
            Scope::Community => "community",
            Scope::Generation => "generation",
            Scope::School => "school",
            Scope::Network => "network",
            Scope::All => "all",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Scope::ORDERED.into_iter().find(|s| s.suffix() == suffix)
    }

    /// A grant at `self` also grants `other`.
    pub fn implies(self, other: Scope) -> bool {
        self >= other
    }

    /// Scopes implied by `self`, including itself, lowest rank first.
    pub fn implied(self) -> impl Iterator<Item = Scope> {
        Scope::ORDERED.into_iter().filter(move |s| self.implies(*s))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// A permission key split into its action base and optional scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PermissionKey<'a> {
    pub base: &'a str,
    pub scope: Option<Scope>,
}

impl<'a> PermissionKey<'a> {
    pub fn parse(key: &'a str) -> Self {
        match key.rsplit_once('_') {
            Some((base, suffix)) if !base.is_empty() => match Scope::from_suffix(suffix) {
                Some(scope) => Self {
                    base,
                    scope: Some(scope),
                },
                None => Self {
                    base: key,
                    scope: None,
                },
            },
            _ => Self {
                base: key,
                scope: None,
            },
        }
    }

    pub fn scope(&self) -> Option<Scope> {
        self.scope
    }

    pub fn is_scoped(&self) -> bool {
        self.scope.is_some()
    }
}

impl fmt::Display for PermissionKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            Some(scope) => write!(f, "{}_{}", self.base, scope),
            None => f.write_str(self.base),
        }
    }
}

/// Builds the full key for `base` at `scope`.
pub fn scoped_key(base: &str, scope: Scope) -> String {
    format!("{}_{}", base, scope.suffix())
}

// =============================================================================
// Unscoped keys
// =============================================================================

pub const VIEW_DASHBOARD: &str = "view_dashboard";
pub const MANAGE_PERMISSIONS: &str = "manage_permissions";
pub const VIEW_AUDIT_LOGS: &str = "view_audit_logs";
pub const MANAGE_SYSTEM_SETTINGS: &str = "manage_system_settings";
pub const MANAGE_NETWORKS: &str = "manage_networks";
pub const SUPERVISE_NETWORK_SCHOOLS: &str = "supervise_network_schools";

// =============================================================================
// Scoped bases used by the API handlers
// =============================================================================

pub const VIEW_USERS: &str = "view_users";
pub const CREATE_USERS: &str = "create_users";
pub const EDIT_USERS: &str = "edit_users";
pub const DELETE_USERS: &str = "delete_users";
pub const MANAGE_USER_ROLES: &str = "manage_user_roles";

pub const VIEW_SCHOOLS: &str = "view_schools";
pub const CREATE_SCHOOLS: &str = "create_schools";
pub const EDIT_SCHOOLS: &str = "edit_schools";
pub const MANAGE_GENERATIONS: &str = "manage_generations";
pub const MANAGE_COMMUNITIES: &str = "manage_communities";

pub const ASSIGN_CONSULTANTS: &str = "assign_consultants";

pub const MANAGE_USER_ROLES_ALL: &str = "manage_user_roles_all";
pub const CREATE_SCHOOLS_ALL: &str = "create_schools_all";

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct ScopedPermission {
    pub base: &'static str,
    pub scopes: &'static [Scope],
}

#[derive(Debug, Clone, Copy)]
pub struct PermissionGroup {
    pub category: &'static str,
    pub permissions: &'static [ScopedPermission],
}

pub const UNSCOPED_CATEGORY: &str = "Sistema";

pub const UNSCOPED: &[&str] = &[
    VIEW_DASHBOARD,
    MANAGE_PERMISSIONS,
    VIEW_AUDIT_LOGS,
    MANAGE_SYSTEM_SETTINGS,
    MANAGE_NETWORKS,
    SUPERVISE_NETWORK_SCHOOLS,
];

const fn p(base: &'static str, scopes: &'static [Scope]) -> ScopedPermission {
    ScopedPermission { base, scopes }
}

use Scope::{All, Community, Generation, Network, Own, School};

pub const GROUPS: &[PermissionGroup] = &[
    PermissionGroup {
        category: "Dashboard & Reports",
        permissions: &[p(
            "view_reports",
            &[School, Generation, Community, Network, All],
        )],
    },
    PermissionGroup {
        category: "Learning Paths",
        permissions: &[
            p("view_learning_paths", &[Own, School, All]),
            p("create_learning_paths", &[School, All]),
            p("edit_learning_paths", &[Own, School, All]),
            p("delete_learning_paths", &[Own, School, All]),
            p("assign_learning_paths", &[All]),
        ],
    },
    PermissionGroup {
        category: "Courses & Content",
        permissions: &[
            p("view_courses", &[Own, School, All]),
            p("create_courses", &[School, All]),
            p("edit_courses", &[Own, School, All]),
            p("delete_courses", &[Own, School, All]),
            p("manage_course_content", &[All]),
        ],
    },
    PermissionGroup {
        category: "News & Articles",
        permissions: &[
            p("view_news", &[All]),
            p("create_news", &[All]),
            p("edit_news", &[Own, School, All]),
            p("delete_news", &[Own, School, All]),
            p("publish_news", &[Own, School, All]),
        ],
    },
    PermissionGroup {
        category: "Events",
        permissions: &[
            p("view_events", &[All]),
            p("create_events", &[School, All]),
            p("edit_events", &[Own, School, All]),
            p("delete_events", &[Own, School, All]),
        ],
    },
    PermissionGroup {
        category: "User Management",
        permissions: &[
            p(VIEW_USERS, &[Own, School, Network, All]),
            p(CREATE_USERS, &[School, All]),
            p(EDIT_USERS, &[Own, School, All]),
            p(DELETE_USERS, &[School, All]),
            p(MANAGE_USER_ROLES, &[All]),
        ],
    },
    PermissionGroup {
        category: "Schools & Organizations",
        permissions: &[
            p(VIEW_SCHOOLS, &[Network, All]),
            p(CREATE_SCHOOLS, &[All]),
            p(EDIT_SCHOOLS, &[Own, Network, All]),
            p("delete_schools", &[All]),
            p(MANAGE_GENERATIONS, &[School, All]),
            p(MANAGE_COMMUNITIES, &[School, All]),
        ],
    },
    PermissionGroup {
        category: "Consultants",
        permissions: &[
            p("view_consultants", &[All]),
            p("create_consultants", &[All]),
            p("edit_consultants", &[All]),
            p("delete_consultants", &[All]),
            p(ASSIGN_CONSULTANTS, &[School, All]),
        ],
    },
    PermissionGroup {
        category: "Financial Management",
        permissions: &[
            p("view_expense_reports", &[Own, School, All]),
            p("create_expense_reports", &[Own, School, All]),
            p("edit_expense_reports", &[Own, School, All]),
            p("approve_expense_reports", &[School, All]),
            p("view_cash_flow", &[School, All]),
        ],
    },
    PermissionGroup {
        category: "Contracts & Internships",
        permissions: &[
            p("view_contracts", &[Own, School, All]),
            p("create_contracts", &[School, All]),
            p("edit_contracts", &[Own, School, All]),
            p("delete_contracts", &[Own, School, All]),
            p("view_internship_proposals", &[Own, School, All]),
            p("create_internship_proposals", &[School, All]),
            p("edit_internship_proposals", &[Own, School, All]),
            p("approve_internship_proposals", &[School, All]),
        ],
    },
    PermissionGroup {
        category: "Workspace & Collaboration",
        permissions: &[
            p("view_workspace", &[Own, School]),
            p("create_workspace_content", &[School, All]),
            p("edit_workspace_content", &[Own, All]),
            p("manage_group_assignments", &[School, All]),
        ],
    },
];

/// Every key of the catalog: unscoped keys first, then each group in order.
pub fn all_keys() -> Vec<String> {
    let mut keys: Vec<String> = UNSCOPED.iter().map(|k| k.to_string()).collect();
    for group in GROUPS {
        for permission in group.permissions {
            for scope in permission.scopes {
                keys.push(scoped_key(permission.base, *scope));
            }
        }
    }
    keys
}

pub fn is_known(key: &str) -> bool {
    category_of(key).is_some()
}

/// Catalog category of `key`, or `None` for keys outside the catalog.
pub fn category_of(key: &str) -> Option<&'static str> {
    if UNSCOPED.contains(&key) {
        return Some(UNSCOPED_CATEGORY);
    }
    let parsed = PermissionKey::parse(key);
    let scope = parsed.scope?;
    GROUPS.iter().find_map(|group| {
        group
            .permissions
            .iter()
            .any(|p| p.base == parsed.base && p.scopes.contains(&scope))
            .then_some(group.category)
    })
}

/// Scopes the catalog defines for `base`; empty for unknown bases.
pub fn scopes_for(base: &str) -> &'static [Scope] {
    GROUPS
        .iter()
        .flat_map(|g| g.permissions.iter())
        .find(|p| p.base == base)
        .map(|p| p.scopes)
        .unwrap_or(&[])
}

/// Distinct scoped bases in catalog order.
pub fn scoped_bases() -> BTreeSet<&'static str> {
    GROUPS
        .iter()
        .flat_map(|g| g.permissions.iter().map(|p| p.base))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_size() {
        assert_eq!(all_keys().len(), 126);
    }

    #[test]
    fn test_catalog_has_no_duplicates() {
        let keys = all_keys();
        let unique: HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len());
    }

    #[test]
    fn test_every_key_is_known() {
        for key in all_keys() {
            assert!(is_known(&key), "{key} should be known");
        }
        assert!(!is_known("view_users_planet"));
        assert!(!is_known("view_schools_school"));
        assert!(!is_known("launch_rockets"));
    }

    #[test]
    fn test_parse_scoped_key() {
        let key = PermissionKey::parse("manage_user_roles_all");
        assert_eq!(key.base, "manage_user_roles");
        assert_eq!(key.scope(), Some(Scope::All));
        assert_eq!(key.to_string(), "manage_user_roles_all");

        let key = PermissionKey::parse("view_reports_generation");
        assert_eq!(key.base, "view_reports");
        assert_eq!(key.scope(), Some(Scope::Generation));
    }

    #[test]
    fn test_parse_unscoped_key() {
        for key in UNSCOPED {
            let parsed = PermissionKey::parse(key);
            assert!(!parsed.is_scoped(), "{key} should be unscoped");
            assert_eq!(parsed.base, *key);
        }
    }

    #[test]
    fn test_parse_bare_suffix_is_unscoped() {
        let key = PermissionKey::parse("_all");
        assert!(!key.is_scoped());
        let key = PermissionKey::parse("all");
        assert!(!key.is_scoped());
    }

    #[test]
    fn test_scope_ordering() {
        assert!(Scope::All.implies(Scope::Network));
        assert!(Scope::All.implies(Scope::School));
        assert!(Scope::All.implies(Scope::Own));
        assert!(Scope::School.implies(Scope::Own));
        assert!(Scope::School.implies(Scope::School));
        assert!(!Scope::School.implies(Scope::Network));
        assert!(!Scope::Own.implies(Scope::School));
    }

    #[test]
    fn test_implied_scopes() {
        let implied: Vec<_> = Scope::School.implied().collect();
        assert_eq!(
            implied,
            vec![Scope::Own, Scope::Community, Scope::Generation, Scope::School]
        );
        assert_eq!(Scope::All.implied().count(), 6);
        assert_eq!(Scope::Own.implied().count(), 1);
    }

    #[test]
    fn test_category_of() {
        assert_eq!(category_of("view_users_school"), Some("User Management"));
        assert_eq!(category_of(MANAGE_PERMISSIONS), Some(UNSCOPED_CATEGORY));
        assert_eq!(category_of("view_users"), None);
    }

    #[test]
    fn test_scopes_for() {
        assert_eq!(scopes_for(VIEW_SCHOOLS), &[Scope::Network, Scope::All]);
        assert!(scopes_for("unknown").is_empty());
        assert!(scoped_bases().contains(VIEW_USERS));
    }

    #[test]
    fn test_scope_serde() {
        assert_eq!(serde_json::to_string(&Scope::Network).unwrap(), r#""network""#);
        let scope: Scope = serde_json::from_str(r#""own""#).unwrap();
        assert_eq!(scope, Scope::Own);
    }
}
