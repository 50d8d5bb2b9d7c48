use anyhow::anyhow;
use tracing::{info, instrument};

use genera_core::AppError;
use genera_core::permissions::ASSIGN_CONSULTANTS;
use genera_db::AccessStore;
use genera_models::consultants::{
    ConsultantAssignment, ConsultantAssignmentFilterParams, ConsultantScope,
    CreateConsultantAssignmentDto, NewConsultantAssignment, UpdateConsultantAssignmentDto,
    check_period,
};
use genera_models::ids::ConsultantAssignmentId;
use genera_models::roles::RoleType;
use genera_models::visibility::Visibility;

use crate::authz::{AccessContext, ResourceScope};
use crate::metrics::{self, AccessEvent};
use crate::modules::schools::SchoolService;

fn resource(assignment: &ConsultantAssignment) -> ResourceScope {
    ResourceScope {
        generation_id: assignment.generation_id,
        community_id: assignment.community_id,
        ..ResourceScope::within_school(assignment.school_id)
    }
}

pub struct ConsultantService;

impl ConsultantService {
    /// Assignments visible through `assign_consultants`. A consultant without
    /// that permission still sees their own assignments.
    #[instrument(skip(store, access, filter))]
    pub async fn list_assignments(
        store: &dyn AccessStore,
        access: &AccessContext,
        filter: ConsultantAssignmentFilterParams,
    ) -> Result<Vec<ConsultantAssignment>, AppError> {
        let (filter, visibility) = match access.visibility(ASSIGN_CONSULTANTS) {
            Ok(visibility) => (filter, visibility),
            Err(denied) => {
                access
                    .require_any_role(&[RoleType::Consultor])
                    .map_err(|_| denied)?;
                let own = ConsultantAssignmentFilterParams {
                    consultant_id: Some(access.user_id().into_inner()),
                    ..filter
                };
                (own, Visibility::Everything)
            }
        };
        Ok(store.list_consultant_assignments(&filter, &visibility).await?)
    }

    /// Validates the anchors of `dto` and creates the assignment.
    ///
    /// Individual assignments are anchored on the student's school, so
    /// `assign_consultants_school` covers students of the caller's schools.
    #[instrument(skip(store, access, dto), fields(scope = %dto.assignment_scope))]
    pub async fn create_assignment(
        store: &dyn AccessStore,
        access: &AccessContext,
        dto: CreateConsultantAssignmentDto,
    ) -> Result<ConsultantAssignment, AppError> {
        dto.check().map_err(|message| AppError::bad_request(anyhow!(message)))?;

        store.get_profile(dto.consultant_id).await?;
        let student_school = match (dto.assignment_scope, dto.student_id) {
            (ConsultantScope::Individual, Some(student_id)) => {
                store.get_profile(student_id).await?.school_id
            }
            _ => {
                SchoolService::check_affiliation(
                    store,
                    dto.school_id,
                    dto.generation_id,
                    dto.community_id,
                )
                .await?;
                None
            }
        };

        let new = NewConsultantAssignment::from_dto(dto, student_school, access.user_id());
        access.authorize(
            ASSIGN_CONSULTANTS,
            &ResourceScope {
                generation_id: new.generation_id,
                community_id: new.community_id,
                ..ResourceScope::within_school(new.school_id)
            },
        )?;

        let assignment = store.create_consultant_assignment(new).await?;
        metrics::record(AccessEvent::ConsultantAssigned {
            scope: assignment.assignment_scope.as_str(),
        });
        info!(
            assignment.id = %assignment.id,
            consultant.id = %assignment.consultant_id,
            assigned_by = %access.user_id(),
            "Consultant assigned"
        );
        Ok(assignment)
    }

    #[instrument(skip(store, access, dto))]
    pub async fn update_assignment(
        store: &dyn AccessStore,
        access: &AccessContext,
        id: ConsultantAssignmentId,
        dto: UpdateConsultantAssignmentDto,
    ) -> Result<ConsultantAssignment, AppError> {
        let current = store.get_consultant_assignment(id).await?;
        access.authorize(ASSIGN_CONSULTANTS, &resource(&current))?;

        check_period(
            dto.starts_at.or(Some(current.starts_at)),
            dto.ends_at.or(current.ends_at),
        )
        .map_err(|message| AppError::bad_request(anyhow!(message)))?;

        let updated = store.update_consultant_assignment(id, dto).await?;
        info!(assignment.id = %id, "Consultant assignment updated");
        Ok(updated)
    }

    /// Soft delete: the row stays, inactive.
    #[instrument(skip(store, access))]
    pub async fn remove_assignment(
        store: &dyn AccessStore,
        access: &AccessContext,
        id: ConsultantAssignmentId,
    ) -> Result<(), AppError> {
        let current = store.get_consultant_assignment(id).await?;
        access.authorize(ASSIGN_CONSULTANTS, &resource(&current))?;

        let removed = store.deactivate_consultant_assignment(id).await?;
        if current.is_active {
            metrics::record(AccessEvent::ConsultantUnassigned {
                scope: removed.assignment_scope.as_str(),
            });
            info!(assignment.id = %id, "Consultant unassigned");
        }
        Ok(())
    }
}
