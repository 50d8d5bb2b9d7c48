use anyhow::anyhow;
use tracing::{info, instrument};

use genera_core::AppError;
use genera_core::permissions::{MANAGE_USER_ROLES_ALL, VIEW_USERS};
use genera_db::store::RoleRemoval;
use genera_db::{AccessStore, StoreError};
use genera_models::ids::{RoleAssignmentId, UserId};
use genera_models::roles::{
    AssignRoleDto, LeaderCommunity, NewRoleAssignment, RoleAssignment, RoleInfo, RoleType,
};

use crate::authz::{AccessContext, ResourceScope};
use crate::metrics::{self, AccessEvent};
use crate::modules::schools::SchoolService;

pub struct RoleService;

impl RoleService {
    /// Role catalog, highest priority first.
    pub fn catalog() -> Vec<RoleInfo> {
        RoleType::ALL.into_iter().map(RoleInfo::from).collect()
    }

    #[instrument(skip(store, access))]
    pub async fn list_user_roles(
        store: &dyn AccessStore,
        access: &AccessContext,
        user_id: UserId,
        include_inactive: bool,
    ) -> Result<Vec<RoleAssignment>, AppError> {
        let target = store.get_profile(user_id).await?;
        access.authorize(VIEW_USERS, &ResourceScope::profile(&target))?;
        Ok(store.list_assignments(user_id, include_inactive).await?)
    }

    /// Validates the anchors of `dto` and assigns the role.
    ///
    /// A `lider_comunidad` assignment without a community gets one named
    /// after the leader, created on first use.
    #[instrument(skip(store, access, dto), fields(role = %dto.role_type))]
    pub async fn assign_role(
        store: &dyn AccessStore,
        access: &AccessContext,
        user_id: UserId,
        dto: AssignRoleDto,
    ) -> Result<RoleAssignment, AppError> {
        access.require_permission(MANAGE_USER_ROLES_ALL)?;
        let target = store.get_profile(user_id).await?;

        let scope = dto.scope();
        let school = SchoolService::check_affiliation(
            store,
            scope.school_id,
            scope.generation_id,
            scope.community_id,
        )
        .await?;
        if let Some(network_id) = scope.network_id {
            match store.get_network(network_id).await {
                Ok(_) => {}
                Err(StoreError::NotFound(_)) => {
                    return Err(AppError::bad_request(anyhow!("La red indicada no existe")));
                }
                Err(e) => return Err(e.into()),
            }
        }

        let role = dto.role_type;
        let requirements = role.requirements();
        let has_generations = school.as_ref().is_some_and(|s| s.has_generations);
        requirements
            .check(role, &scope, has_generations)
            .map_err(|message| AppError::bad_request(anyhow!(message)))?;

        let leader_community = match (requirements.creates_community, scope.community_id, &school)
        {
            (true, None, Some(school)) => Some(LeaderCommunity {
                school_id: school.id,
                generation_id: scope.generation_id,
                name: LeaderCommunity::name_for(&target.first_name, &target.last_name),
            }),
            _ => None,
        };

        let assignment = store
            .assign_role(
                NewRoleAssignment {
                    user_id,
                    role_type: role,
                    scope,
                    assigned_by: Some(access.user_id()),
                },
                leader_community,
            )
            .await?;

        metrics::record(AccessEvent::RoleAssigned { role: role.as_str() });
        info!(
            user.id = %user_id,
            assignment.id = %assignment.id,
            assigned_by = %access.user_id(),
            "Role assigned"
        );
        Ok(assignment)
    }

    /// Deactivates an assignment of `user_id`. The last active admin
    /// assignment cannot be removed.
    #[instrument(skip(store, access))]
    pub async fn remove_role(
        store: &dyn AccessStore,
        access: &AccessContext,
        user_id: UserId,
        assignment_id: RoleAssignmentId,
    ) -> Result<RoleAssignment, AppError> {
        access.require_permission(MANAGE_USER_ROLES_ALL)?;

        let assignment = store.get_assignment(assignment_id).await?;
        if assignment.user_id != user_id {
            return Err(AppError::not_found(anyhow!(
                "Asignación de rol no encontrada para este usuario"
            )));
        }

        let removed = store
            .remove_role(RoleRemoval {
                assignment_id,
                reason: None,
                performed_by: Some(access.user_id()),
            })
            .await?;

        metrics::record(AccessEvent::RoleRemoved { role: removed.role_type.as_str() });
        info!(user.id = %user_id, assignment.id = %assignment_id, "Role removed");
        Ok(removed)
    }
}
