//! Integrity checks over the permission matrix and role assignments.
//!
//! Both checks are pure functions over rows read from the store, so the
//! CLI only fetches and prints.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};

use genera_core::permissions::{self as catalog, PermissionKey, Scope, scoped_key};
use genera_models::permissions::RolePermission;
use genera_models::roles::{RoleAssignment, RoleType};

/// Upper bound on the keys an `estudiante` may hold.
pub const MAX_STUDENT_KEYS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixIssue {
    /// More than one live row for the same pair.
    Duplicate {
        role: RoleType,
        key: String,
        count: usize,
    },
    Missing {
        role: RoleType,
        key: String,
    },
    AdminNotGranted {
        key: String,
    },
    UnknownKey {
        role: RoleType,
        key: String,
    },
    StudentOverGranted {
        count: usize,
    },
    CommunityManagerExpenseScope {
        key: String,
    },
    EditWithoutView {
        role: RoleType,
        edit: String,
        view_base: String,
    },
}

impl fmt::Display for MatrixIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatrixIssue::Duplicate { role, key, count } => {
                write!(f, "{role}/{key}: {count} live rows")
            }
            MatrixIssue::Missing { role, key } => write!(f, "{role}/{key}: no live row"),
            MatrixIssue::AdminNotGranted { key } => write!(f, "admin/{key}: not granted"),
            MatrixIssue::UnknownKey { role, key } => {
                write!(f, "{role}/{key}: key is not in the catalog")
            }
            MatrixIssue::StudentOverGranted { count } => write!(
                f,
                "estudiante holds {count} keys (at most {MAX_STUDENT_KEYS})"
            ),
            MatrixIssue::CommunityManagerExpenseScope { key } => {
                write!(f, "community_manager/{key}: expense keys must be _own")
            }
            MatrixIssue::EditWithoutView {
                role,
                edit,
                view_base,
            } => write!(f, "{role}/{edit}: granted without {view_base}"),
        }
    }
}

fn holds_at_some_scope(effective: &BTreeSet<&str>, base: &str) -> bool {
    Scope::ORDERED
        .into_iter()
        .any(|scope| effective.contains(scoped_key(base, scope).as_str()))
}

fn base_in_catalog(base: &str) -> bool {
    Scope::ORDERED
        .into_iter()
        .any(|scope| catalog::is_known(&scoped_key(base, scope)))
}

/// Checks the matrix invariants. An empty result means the matrix is sound.
pub fn verify_matrix(rows: &[RolePermission], now: DateTime<Utc>) -> Vec<MatrixIssue> {
    let mut issues = Vec::new();

    let mut live: BTreeMap<(RoleType, &str), usize> = BTreeMap::new();
    let mut effective: BTreeMap<RoleType, BTreeSet<&str>> = BTreeMap::new();
    for row in rows {
        if !catalog::is_known(&row.permission_key) {
            issues.push(MatrixIssue::UnknownKey {
                role: row.role_type,
                key: row.permission_key.clone(),
            });
        }
        if row.active && !row.is_test {
            *live
                .entry((row.role_type, row.permission_key.as_str()))
                .or_default() += 1;
        }
        if row.is_effective(now) {
            effective
                .entry(row.role_type)
                .or_default()
                .insert(row.permission_key.as_str());
        }
    }

    for ((role, key), count) in &live {
        if *count > 1 {
            issues.push(MatrixIssue::Duplicate {
                role: *role,
                key: key.to_string(),
                count: *count,
            });
        }
    }

    let keys = catalog::all_keys();
    for role in RoleType::ALL {
        for key in &keys {
            if !live.contains_key(&(role, key.as_str())) {
                issues.push(MatrixIssue::Missing {
                    role,
                    key: key.clone(),
                });
            }
        }
    }

    let empty = BTreeSet::new();
    let admin = effective.get(&RoleType::Admin).unwrap_or(&empty);
    for key in &keys {
        if !admin.contains(key.as_str()) {
            issues.push(MatrixIssue::AdminNotGranted { key: key.clone() });
        }
    }

    let student_count = effective.get(&RoleType::Estudiante).map_or(0, BTreeSet::len);
    if student_count > MAX_STUDENT_KEYS {
        issues.push(MatrixIssue::StudentOverGranted {
            count: student_count,
        });
    }

    if let Some(granted) = effective.get(&RoleType::CommunityManager) {
        for key in granted {
            let parsed = PermissionKey::parse(key);
            if parsed.base.contains("expense") && parsed.scope != Some(Scope::Own) {
                issues.push(MatrixIssue::CommunityManagerExpenseScope {
                    key: key.to_string(),
                });
            }
        }
    }

    for (role, granted) in &effective {
        for key in granted {
            let parsed = PermissionKey::parse(key);
            let Some(object) = parsed.base.strip_prefix("edit_") else {
                continue;
            };
            if parsed.scope != Some(Scope::Own) {
                continue;
            }
            let view_base = format!("view_{object}");
            if base_in_catalog(&view_base) && !holds_at_some_scope(granted, &view_base) {
                issues.push(MatrixIssue::EditWithoutView {
                    role: *role,
                    edit: key.to_string(),
                    view_base,
                });
            }
        }
    }

    issues
}

/// Why an active assignment breaks its role's requirements, if it does.
pub fn assignment_violation(
    assignment: &RoleAssignment,
    school_has_generations: bool,
) -> Option<String> {
    let role = assignment.role_type;
    let requirements = role.requirements();
    if let Err(message) = requirements.check(role, &assignment.scope(), school_has_generations) {
        return Some(message);
    }
    if requirements.creates_community && assignment.community_id.is_none() {
        return Some(format!(
            "El rol \"{}\" requiere una comunidad asignada",
            role.display_name()
        ));
    }
    None
}
