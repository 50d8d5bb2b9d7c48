use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
};
use tracing::instrument;

use genera_core::AppError;
use genera_models::consultants::{
    ConsultantAssignment, ConsultantAssignmentFilterParams, CreateConsultantAssignmentDto,
    UpdateConsultantAssignmentDto,
};
use genera_models::ids::ConsultantAssignmentId;

use crate::middleware::auth::Access;
use crate::modules::auth::controller::ErrorResponse;
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::service::ConsultantService;

/// List consultant assignments visible to the caller
#[utoipa::path(
    get,
    path = "/api/consultant-assignments",
    params(
        ("consultant_id" = Option<String>, Query, description = "Filter by consultant"),
        ("student_id" = Option<String>, Query, description = "Filter by student"),
        ("include_inactive" = Option<bool>, Query, description = "Include removed assignments")
    ),
    responses(
        (status = 200, description = "Assignments, newest first", body = Vec<ConsultantAssignment>),
        (status = 400, description = "Invalid query parameters", body = ErrorResponse),
        (status = 403, description = "Neither assign_consultants nor consultor", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Consultants"
)]
#[instrument(skip(state, access, filters))]
pub async fn get_assignments(
    State(state): State<AppState>,
    access: Access,
    filters: Result<Query<ConsultantAssignmentFilterParams>, QueryRejection>,
) -> Result<Json<Vec<ConsultantAssignment>>, AppError> {
    let Query(filters) = filters.map_err(|e| {
        AppError::bad_request(anyhow::anyhow!("Parámetros de consulta inválidos: {}", e))
    })?;
    let assignments = ConsultantService::list_assignments(state.store(), &access, filters).await?;
    Ok(Json(assignments))
}

#[utoipa::path(
    post,
    path = "/api/consultant-assignments",
    request_body = CreateConsultantAssignmentDto,
    responses(
        (status = 201, description = "Consultant assigned", body = ConsultantAssignment),
        (status = 400, description = "Missing anchors or unknown organization", body = ErrorResponse),
        (status = 403, description = "Missing assign_consultants for the target", body = ErrorResponse),
        (status = 404, description = "Consultant or student not found", body = ErrorResponse),
        (status = 409, description = "An active assignment for this target exists", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Consultants"
)]
#[instrument(skip(state, access, dto))]
pub async fn create_assignment(
    State(state): State<AppState>,
    access: Access,
    ValidatedJson(dto): ValidatedJson<CreateConsultantAssignmentDto>,
) -> Result<(StatusCode, Json<ConsultantAssignment>), AppError> {
    let assignment = ConsultantService::create_assignment(state.store(), &access, dto).await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

#[utoipa::path(
    put,
    path = "/api/consultant-assignments/{id}",
    params(("id" = ConsultantAssignmentId, Path, description = "Assignment ID")),
    request_body = UpdateConsultantAssignmentDto,
    responses(
        (status = 200, description = "Assignment updated", body = ConsultantAssignment),
        (status = 400, description = "End date before start date", body = ErrorResponse),
        (status = 403, description = "Missing assign_consultants for the target", body = ErrorResponse),
        (status = 404, description = "Assignment not found", body = ErrorResponse),
        (status = 409, description = "Reactivating would duplicate an active assignment", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Consultants"
)]
#[instrument(skip(state, access, dto))]
pub async fn update_assignment(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<ConsultantAssignmentId>,
    ValidatedJson(dto): ValidatedJson<UpdateConsultantAssignmentDto>,
) -> Result<Json<ConsultantAssignment>, AppError> {
    let assignment = ConsultantService::update_assignment(state.store(), &access, id, dto).await?;
    Ok(Json(assignment))
}

#[utoipa::path(
    delete,
    path = "/api/consultant-assignments/{id}",
    params(("id" = ConsultantAssignmentId, Path, description = "Assignment ID")),
    responses(
        (status = 204, description = "Assignment deactivated"),
        (status = 403, description = "Missing assign_consultants for the target", body = ErrorResponse),
        (status = 404, description = "Assignment not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Consultants"
)]
#[instrument(skip(state, access))]
pub async fn delete_assignment(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<ConsultantAssignmentId>,
) -> Result<StatusCode, AppError> {
    ConsultantService::remove_assignment(state.store(), &access, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
