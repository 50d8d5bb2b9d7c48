use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
};
use tracing::instrument;

use genera_core::AppError;
use genera_models::audit::{AuditFilterParams, PaginatedAuditResponse};
use genera_models::permissions::{
    CatalogCategory, MatrixFilterParams, PermissionChangeOutcome, PermissionCheckParams,
    PermissionCheckResponse, RolePermission, UpdatePermissionDto,
};
use genera_models::roles::RoleType;

use crate::middleware::auth::Access;
use crate::modules::auth::controller::ErrorResponse;
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::service::PermissionService;

fn query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    query.map(|Query(params)| params).map_err(|e| {
        AppError::bad_request(anyhow::anyhow!("Parámetros de consulta inválidos: {}", e))
    })
}

/// Permission catalog grouped by category
#[utoipa::path(
    get,
    path = "/api/permissions",
    responses(
        (status = 200, description = "Every permission key", body = Vec<CatalogCategory>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Permissions"
)]
pub async fn get_catalog(_access: Access) -> Json<Vec<CatalogCategory>> {
    Json(PermissionService::catalog())
}

/// Whether the caller holds a permission
#[utoipa::path(
    get,
    path = "/api/permissions/check",
    params(("permission_key" = String, Query, description = "Permission key, e.g. view_users_school")),
    responses(
        (status = 200, description = "Decision", body = PermissionCheckResponse),
        (status = 400, description = "Unknown permission key", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Permissions"
)]
#[instrument(skip(access, params))]
pub async fn check_permission(
    access: Access,
    params: Result<Query<PermissionCheckParams>, QueryRejection>,
) -> Result<Json<PermissionCheckResponse>, AppError> {
    let params = query(params)?;
    let response = PermissionService::check(&access, &params.permission_key)?;
    Ok(Json(response))
}

/// Rows of the role × permission matrix
#[utoipa::path(
    get,
    path = "/api/permissions/matrix",
    params(
        ("role_type" = Option<RoleType>, Query, description = "Only rows of this role type"),
        ("permission_key" = Option<String>, Query, description = "Only rows of this key"),
        ("include_test" = Option<bool>, Query, description = "Include test rows")
    ),
    responses(
        (status = 200, description = "Matrix rows", body = Vec<RolePermission>),
        (status = 403, description = "Missing manage_permissions", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Permissions"
)]
#[instrument(skip(state, access, params))]
pub async fn get_matrix(
    State(state): State<AppState>,
    access: Access,
    params: Result<Query<MatrixFilterParams>, QueryRejection>,
) -> Result<Json<Vec<RolePermission>>, AppError> {
    let filters = query(params)?;
    let rows = PermissionService::matrix(state.store(), &access, filters).await?;
    Ok(Json(rows))
}

/// Grant or revoke a permission for a role type
#[utoipa::path(
    put,
    path = "/api/permissions/matrix/{role_type}/{permission_key}",
    params(
        ("role_type" = RoleType, Path, description = "Role type"),
        ("permission_key" = String, Path, description = "Permission key")
    ),
    request_body = UpdatePermissionDto,
    responses(
        (status = 200, description = "Row after the change", body = PermissionChangeOutcome),
        (status = 400, description = "Unknown key, or admin would lose manage_permissions", body = ErrorResponse),
        (status = 403, description = "Missing manage_permissions", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Permissions"
)]
#[instrument(skip(state, access, dto))]
pub async fn update_permission(
    State(state): State<AppState>,
    access: Access,
    Path((role_type, permission_key)): Path<(RoleType, String)>,
    ValidatedJson(dto): ValidatedJson<UpdatePermissionDto>,
) -> Result<Json<PermissionChangeOutcome>, AppError> {
    let outcome =
        PermissionService::update(state.store(), &access, role_type, &permission_key, dto).await?;
    Ok(Json(outcome))
}

/// Permission and role audit trail, newest first
#[utoipa::path(
    get,
    path = "/api/permissions/audit",
    params(
        ("action" = Option<String>, Query, description = "Audit action"),
        ("role_type" = Option<RoleType>, Query, description = "Role type"),
        ("permission_key" = Option<String>, Query, description = "Permission key"),
        ("user_id" = Option<String>, Query, description = "Affected user"),
        ("performed_by" = Option<String>, Query, description = "Acting user"),
        ("limit" = Option<i64>, Query, description = "Limit number of results"),
        ("offset" = Option<i64>, Query, description = "Offset for pagination"),
        ("page" = Option<i64>, Query, description = "Page number (1-based)")
    ),
    responses(
        (status = 200, description = "Audit entries", body = PaginatedAuditResponse),
        (status = 403, description = "Missing view_audit_logs", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Permissions"
)]
#[instrument(skip(state, access, params))]
pub async fn get_audit(
    State(state): State<AppState>,
    access: Access,
    params: Result<Query<AuditFilterParams>, QueryRejection>,
) -> Result<Json<PaginatedAuditResponse>, AppError> {
    let filters = query(params)?;
    let entries = PermissionService::audit(state.store(), &access, filters).await?;
    Ok(Json(entries))
}
