//! Demo profiles and their role assignments.

use fake::Fake;
use fake::faker::name::en::{FirstName, LastName};
use rayon::prelude::*;
use serde_json::json;
use sqlx::{Postgres, QueryBuilder, Transaction};

use genera_models::audit::AuditAction;
use genera_models::ids::{CommunityId, GenerationId, SchoolId, UserId};
use genera_models::profiles::ApprovalStatus;
use genera_models::roles::RoleType;

use super::models::{
    DEMO_AUDIT_REASON, DEMO_EMAIL_DOMAIN, DemoConfig, Organizations, People, ProfileSeed,
    RoleSeed,
};

#[derive(Clone, Copy)]
struct Anchor {
    school_id: SchoolId,
    generation_id: Option<GenerationId>,
    community_id: Option<CommunityId>,
}

fn slug(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

/// `tag` is unique per group and `group` per run, which keeps emails unique.
fn person(
    role_type: RoleType,
    anchor: Anchor,
    group: &str,
    tag: &str,
    password_hash: &str,
) -> (ProfileSeed, RoleSeed) {
    let first_name: String = FirstName().fake();
    let last_name: String = LastName().fake();
    let id = UserId::new();
    let email = format!(
        "{}.{}.{group}-{tag}@{DEMO_EMAIL_DOMAIN}",
        slug(&first_name),
        slug(&last_name)
    );

    let profile = ProfileSeed {
        id,
        first_name,
        last_name,
        email,
        password_hash: password_hash.to_string(),
        school_id: Some(anchor.school_id),
        generation_id: anchor.generation_id,
        community_id: anchor.community_id,
    };
    let role = RoleSeed {
        user_id: id,
        role_type,
        school_id: Some(anchor.school_id),
        generation_id: anchor.generation_id,
        community_id: anchor.community_id,
    };
    (profile, role)
}

/// One `equipo_directivo` per school, one `lider_generacion` per generation,
/// and per community one `lider_comunidad` plus docentes and estudiantes.
pub fn generate_people(
    organizations: &Organizations,
    config: &DemoConfig,
    password_hash: &str,
) -> People {
    let directors = organizations
        .schools
        .par_iter()
        .enumerate()
        .map(|(idx, school)| {
            let anchor = Anchor {
                school_id: school.id,
                generation_id: None,
                community_id: None,
            };
            vec![person(
                RoleType::EquipoDirectivo,
                anchor,
                &format!("s{idx}"),
                "dir",
                password_hash,
            )]
        });

    let generation_leaders = organizations
        .generations
        .par_iter()
        .enumerate()
        .map(|(idx, generation)| {
            let anchor = Anchor {
                school_id: generation.school_id,
                generation_id: Some(generation.id),
                community_id: None,
            };
            vec![person(
                RoleType::LiderGeneracion,
                anchor,
                &format!("g{idx}"),
                "lider",
                password_hash,
            )]
        });

    let members = organizations
        .communities
        .par_iter()
        .enumerate()
        .map(|(idx, community)| {
            let anchor = Anchor {
                school_id: community.school_id,
                generation_id: community.generation_id,
                community_id: Some(community.id),
            };
            let group = format!("c{idx}");
            let mut people = Vec::with_capacity(
                1 + config.docentes_per_community + config.estudiantes_per_community,
            );
            people.push(person(
                RoleType::LiderComunidad,
                anchor,
                &group,
                "lider",
                password_hash,
            ));
            for n in 0..config.docentes_per_community {
                people.push(person(
                    RoleType::Docente,
                    anchor,
                    &group,
                    &format!("doc{n}"),
                    password_hash,
                ));
            }
            for n in 0..config.estudiantes_per_community {
                people.push(person(
                    RoleType::Estudiante,
                    anchor,
                    &group,
                    &format!("est{n}"),
                    password_hash,
                ));
            }
            people
        });

    let (profiles, roles): (Vec<_>, Vec<_>) = directors
        .chain(generation_leaders)
        .chain(members)
        .flatten()
        .unzip();

    People { profiles, roles }
}

// Eight binds per profile row.
const BATCH_SIZE: usize = 1000;

pub async fn insert_people(
    tx: &mut Transaction<'_, Postgres>,
    people: &People,
) -> Result<(), sqlx::Error> {
    for chunk in people.profiles.chunks(BATCH_SIZE) {
        QueryBuilder::<Postgres>::new(
            "INSERT INTO profiles (id, email, first_name, last_name, password_hash, \
             school_id, generation_id, community_id, approval_status) ",
        )
        .push_values(chunk, |mut row, profile| {
            row.push_bind(profile.id)
                .push_bind(profile.email.clone())
                .push_bind(profile.first_name.clone())
                .push_bind(profile.last_name.clone())
                .push_bind(profile.password_hash.clone())
                .push_bind(profile.school_id)
                .push_bind(profile.generation_id)
                .push_bind(profile.community_id)
                .push_bind(ApprovalStatus::Approved);
        })
        .build()
        .execute(&mut **tx)
        .await?;
    }

    for chunk in people.roles.chunks(BATCH_SIZE) {
        QueryBuilder::<Postgres>::new(
            "INSERT INTO user_roles (user_id, role_type, school_id, generation_id, community_id) ",
        )
        .push_values(chunk, |mut row, role| {
            row.push_bind(role.user_id)
                .push_bind(role.role_type)
                .push_bind(role.school_id)
                .push_bind(role.generation_id)
                .push_bind(role.community_id);
        })
        .build()
        .execute(&mut **tx)
        .await?;

        QueryBuilder::<Postgres>::new(
            "INSERT INTO permission_audit_log (action, role_type, user_id, new_value, reason) ",
        )
        .push_values(chunk, |mut row, role| {
            let value = json!({
                "role_type": role.role_type,
                "school_id": role.school_id,
                "generation_id": role.generation_id,
                "community_id": role.community_id,
                "is_active": true,
            });
            row.push_bind(AuditAction::RoleAssigned)
                .push_bind(role.role_type)
                .push_bind(role.user_id)
                .push_bind(value)
                .push_bind(DEMO_AUDIT_REASON);
        })
        .build()
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::assignment_violation;
    use crate::seeder::organizations::generate_organizations;
    use std::collections::HashSet;

    #[test]
    fn test_people_per_organization() {
        let config = DemoConfig::new(2).with_people(2, 3);
        let orgs = generate_organizations(&config);
        let people = generate_people(&orgs, &config, "hash");

        let expected = orgs.schools.len()
            + orgs.generations.len()
            + orgs.communities.len() * (1 + 2 + 3);
        assert_eq!(people.profiles.len(), expected);
        assert_eq!(people.roles.len(), expected);

        let leaders = people
            .roles
            .iter()
            .filter(|r| r.role_type == RoleType::LiderComunidad)
            .count();
        assert_eq!(leaders, orgs.communities.len());
    }

    #[test]
    fn test_emails_are_unique_and_marked() {
        let config = DemoConfig::new(3);
        let orgs = generate_organizations(&config);
        let people = generate_people(&orgs, &config, "hash");

        let emails: HashSet<&str> = people.profiles.iter().map(|p| p.email.as_str()).collect();
        assert_eq!(emails.len(), people.profiles.len());
        assert!(
            people
                .profiles
                .iter()
                .all(|p| p.email.ends_with(&format!("@{DEMO_EMAIL_DOMAIN}")))
        );
    }

    #[test]
    fn test_seeded_assignments_meet_role_requirements() {
        let config = DemoConfig::new(2);
        let orgs = generate_organizations(&config);
        let people = generate_people(&orgs, &config, "hash");

        for role in &people.roles {
            let school = orgs
                .schools
                .iter()
                .find(|s| Some(s.id) == role.school_id)
                .unwrap();
            let assignment = genera_models::roles::RoleAssignment {
                id: genera_models::ids::RoleAssignmentId::new(),
                user_id: role.user_id,
                role_type: role.role_type,
                school_id: role.school_id,
                generation_id: role.generation_id,
                community_id: role.community_id,
                network_id: None,
                is_active: true,
                assigned_by: None,
                assigned_at: chrono::Utc::now(),
                created_at: chrono::Utc::now(),
            };
            assert_eq!(
                assignment_violation(&assignment, school.has_generations),
                None,
                "{:?}",
                role.role_type
            );
        }
    }
}
