use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
};
use tracing::instrument;

use genera_core::AppError;
use genera_models::ids::{RoleAssignmentId, UserId};
use genera_models::roles::{AssignRoleDto, RoleAssignment, RoleAssignmentFilterParams, RoleInfo};

use crate::middleware::auth::Access;
use crate::modules::auth::controller::ErrorResponse;
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::service::RoleService;

/// Role catalog with the anchors each role needs
#[utoipa::path(
    get,
    path = "/api/roles",
    responses(
        (status = 200, description = "Role types, highest priority first", body = Vec<RoleInfo>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Roles"
)]
pub async fn get_roles(_access: Access) -> Json<Vec<RoleInfo>> {
    Json(RoleService::catalog())
}

#[utoipa::path(
    get,
    path = "/api/users/{id}/roles",
    params(
        ("id" = UserId, Path, description = "User ID"),
        ("include_inactive" = Option<bool>, Query, description = "Also return removed assignments")
    ),
    responses(
        (status = 200, description = "Role assignments of the user", body = Vec<RoleAssignment>),
        (status = 403, description = "User outside the caller's scope", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Roles"
)]
#[instrument(skip(state, access, params))]
pub async fn get_user_roles(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<UserId>,
    params: Result<Query<RoleAssignmentFilterParams>, QueryRejection>,
) -> Result<Json<Vec<RoleAssignment>>, AppError> {
    let Query(params) = params.map_err(|e| {
        AppError::bad_request(anyhow::anyhow!("Parámetros de consulta inválidos: {}", e))
    })?;
    let include_inactive = params.include_inactive.unwrap_or(false);
    let roles = RoleService::list_user_roles(state.store(), &access, id, include_inactive).await?;
    Ok(Json(roles))
}

#[utoipa::path(
    post,
    path = "/api/users/{id}/roles",
    params(("id" = UserId, Path, description = "User ID")),
    request_body = AssignRoleDto,
    responses(
        (status = 201, description = "Role assigned", body = RoleAssignment),
        (status = 400, description = "Missing or inconsistent school, generation, community, or network", body = ErrorResponse),
        (status = 403, description = "Missing manage_user_roles_all", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "Identical active assignment exists", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Roles"
)]
#[instrument(skip(state, access, dto))]
pub async fn assign_role(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<UserId>,
    ValidatedJson(dto): ValidatedJson<AssignRoleDto>,
) -> Result<(StatusCode, Json<RoleAssignment>), AppError> {
    let assignment = RoleService::assign_role(state.store(), &access, id, dto).await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}/roles/{assignment_id}",
    params(
        ("id" = UserId, Path, description = "User ID"),
        ("assignment_id" = RoleAssignmentId, Path, description = "Role assignment ID")
    ),
    responses(
        (status = 204, description = "Assignment deactivated"),
        (status = 403, description = "Missing manage_user_roles_all", body = ErrorResponse),
        (status = 404, description = "Assignment not found for this user", body = ErrorResponse),
        (status = 409, description = "Last active admin, or already inactive", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Roles"
)]
#[instrument(skip(state, access))]
pub async fn remove_role(
    State(state): State<AppState>,
    access: Access,
    Path((id, assignment_id)): Path<(UserId, RoleAssignmentId)>,
) -> Result<StatusCode, AppError> {
    RoleService::remove_role(state.store(), &access, id, assignment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
