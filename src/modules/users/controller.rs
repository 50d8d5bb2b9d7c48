use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
};
use tracing::instrument;

use genera_core::AppError;
use genera_models::ids::UserId;
use genera_models::profiles::{
    CreateUserDto, PaginatedProfilesResponse, Profile, ProfileFilterParams, ProfileWithRoles,
    UpdateApprovalDto, UpdateUserDto,
};

use crate::middleware::auth::Access;
use crate::modules::auth::controller::ErrorResponse;
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::service::UserService;

/// List the users visible to the caller
#[utoipa::path(
    get,
    path = "/api/users",
    params(
        ("search" = Option<String>, Query, description = "Match on email, first name, or last name"),
        ("school_id" = Option<String>, Query, description = "Filter by school ID"),
        ("approval_status" = Option<String>, Query, description = "pending, approved, rejected, or disabled"),
        ("limit" = Option<i64>, Query, description = "Limit number of results"),
        ("offset" = Option<i64>, Query, description = "Offset for pagination"),
        ("page" = Option<i64>, Query, description = "Page number (1-based)")
    ),
    responses(
        (status = 200, description = "Paginated users", body = PaginatedProfilesResponse),
        (status = 400, description = "Invalid query parameters", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Missing view_users", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
#[instrument(skip(state, access, filters))]
pub async fn get_users(
    State(state): State<AppState>,
    access: Access,
    filters: Result<Query<ProfileFilterParams>, QueryRejection>,
) -> Result<Json<PaginatedProfilesResponse>, AppError> {
    let Query(filters) = filters.map_err(|e| {
        AppError::bad_request(anyhow::anyhow!("Parámetros de consulta inválidos: {}", e))
    })?;
    let users = UserService::list_users(state.store(), &access, filters).await?;
    Ok(Json(users))
}

/// Create a user
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserDto,
    responses(
        (status = 201, description = "User created", body = Profile),
        (status = 400, description = "Unknown or inconsistent school, generation, or community", body = ErrorResponse),
        (status = 403, description = "Missing create_users for the target school", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
#[instrument(skip(state, access, dto))]
pub async fn create_user(
    State(state): State<AppState>,
    access: Access,
    ValidatedJson(dto): ValidatedJson<CreateUserDto>,
) -> Result<(StatusCode, Json<Profile>), AppError> {
    let user = UserService::create_user(state.store(), &access, dto).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Get a user with their active roles
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = UserId, Path, description = "User ID")),
    responses(
        (status = 200, description = "User details", body = ProfileWithRoles),
        (status = 403, description = "User outside the caller's scope", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
#[instrument(skip(state, access))]
pub async fn get_user(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<UserId>,
) -> Result<Json<ProfileWithRoles>, AppError> {
    let user = UserService::get_user(state.store(), &access, id).await?;
    Ok(Json(user))
}

/// Edit a user's names or affiliation
#[utoipa::path(
    patch,
    path = "/api/users/{id}",
    params(("id" = UserId, Path, description = "User ID")),
    request_body = UpdateUserDto,
    responses(
        (status = 200, description = "User updated", body = Profile),
        (status = 400, description = "Inconsistent affiliation", body = ErrorResponse),
        (status = 403, description = "Missing edit_users for the user or destination school", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
#[instrument(skip(state, access, dto))]
pub async fn update_user(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<UserId>,
    ValidatedJson(dto): ValidatedJson<UpdateUserDto>,
) -> Result<Json<Profile>, AppError> {
    let user = UserService::update_user(state.store(), &access, id, dto).await?;
    Ok(Json(user))
}

/// Approve, reject, or reset a user's account status
#[utoipa::path(
    patch,
    path = "/api/users/{id}/approval",
    params(("id" = UserId, Path, description = "User ID")),
    request_body = UpdateApprovalDto,
    responses(
        (status = 200, description = "Status changed", body = Profile),
        (status = 400, description = "Own account, or `disabled` requested", body = ErrorResponse),
        (status = 403, description = "Missing edit_users for the user", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
#[instrument(skip(state, access, dto))]
pub async fn update_approval(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<UserId>,
    ValidatedJson(dto): ValidatedJson<UpdateApprovalDto>,
) -> Result<Json<Profile>, AppError> {
    let user = UserService::update_approval(state.store(), &access, id, dto).await?;
    Ok(Json(user))
}

/// Disable a user (soft delete)
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = UserId, Path, description = "User ID")),
    responses(
        (status = 204, description = "User disabled"),
        (status = 400, description = "Own account", body = ErrorResponse),
        (status = 403, description = "Missing delete_users for the user", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
#[instrument(skip(state, access))]
pub async fn delete_user(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<UserId>,
) -> Result<StatusCode, AppError> {
    UserService::disable_user(state.store(), &access, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
