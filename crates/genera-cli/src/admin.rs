//! Administrator bootstrap.
//!
//! The first `admin` cannot be created through the API (assigning roles
//! requires `manage_user_roles_all`), so it is created here.

use anyhow::Context;

use genera_core::hash_password;
use genera_db::AccessStore;
use genera_models::profiles::{ApprovalStatus, NewProfile, Profile};
use genera_models::roles::{AssignmentScope, NewRoleAssignment, RoleAssignment, RoleType};

pub struct NewAdmin {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// Creates an approved profile holding a global `admin` assignment.
pub async fn create_admin(
    store: &dyn AccessStore,
    admin: NewAdmin,
) -> anyhow::Result<(Profile, RoleAssignment)> {
    if admin.password.len() < 8 {
        anyhow::bail!("La contraseña debe tener al menos 8 caracteres");
    }

    let password_hash = hash_password(&admin.password)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e.error))?;

    let profile = store
        .create_profile(NewProfile {
            email: admin.email.trim().to_lowercase(),
            first_name: admin.first_name.trim().to_string(),
            last_name: admin.last_name.trim().to_string(),
            password_hash,
            school_id: None,
            generation_id: None,
            community_id: None,
            approval_status: ApprovalStatus::Approved,
        })
        .await
        .context("failed to create the profile")?;

    let assignment = store
        .assign_role(
            NewRoleAssignment {
                user_id: profile.id,
                role_type: RoleType::Admin,
                scope: AssignmentScope::default(),
                assigned_by: None,
            },
            None,
        )
        .await
        .context("failed to assign the admin role")?;

    Ok((profile, assignment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use genera_db::MemoryStore;

    fn admin(email: &str, password: &str) -> NewAdmin {
        NewAdmin {
            first_name: "Ana".into(),
            last_name: "Rojas".into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn test_create_admin_is_approved_with_admin_role() {
        let store = MemoryStore::new();
        let (profile, assignment) = create_admin(&store, admin("Ana@Genera.cl", "secreto123"))
            .await
            .unwrap();

        assert_eq!(profile.email, "ana@genera.cl");
        assert!(profile.is_approved());
        assert_eq!(assignment.role_type, RoleType::Admin);
        assert!(assignment.is_active);
        assert_eq!(assignment.user_id, profile.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_fails() {
        let store = MemoryStore::new();
        create_admin(&store, admin("ana@genera.cl", "secreto123"))
            .await
            .unwrap();
        assert!(
            create_admin(&store, admin("ANA@genera.cl", "secreto123"))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_short_password_is_rejected() {
        let store = MemoryStore::new();
        assert!(create_admin(&store, admin("ana@genera.cl", "corta")).await.is_err());
    }
}
