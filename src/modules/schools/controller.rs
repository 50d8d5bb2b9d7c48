use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
};
use tracing::instrument;

use genera_core::AppError;
use genera_models::ids::SchoolId;
use genera_models::organizations::{
    Community, CreateCommunityDto, CreateGenerationDto, CreateSchoolDto, Generation,
    PaginatedSchoolsResponse, School, SchoolFilterParams, UpdateSchoolDto,
};

use crate::middleware::auth::Access;
use crate::modules::auth::controller::ErrorResponse;
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::service::SchoolService;

#[utoipa::path(
    get,
    path = "/api/schools",
    params(
        ("name" = Option<String>, Query, description = "Filter by school name (partial match)"),
        ("limit" = Option<i64>, Query, description = "Limit number of results"),
        ("offset" = Option<i64>, Query, description = "Offset for pagination"),
        ("page" = Option<i64>, Query, description = "Page number (1-based)")
    ),
    responses(
        (status = 200, description = "Schools visible to the caller", body = PaginatedSchoolsResponse),
        (status = 400, description = "Invalid query parameters", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Missing view_schools", body = ErrorResponse)
    ),
    tag = "Schools",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, access, filters))]
pub async fn get_schools(
    State(state): State<AppState>,
    access: Access,
    filters: Result<Query<SchoolFilterParams>, QueryRejection>,
) -> Result<Json<PaginatedSchoolsResponse>, AppError> {
    let Query(filters) = filters.map_err(|e| {
        AppError::bad_request(anyhow::anyhow!("Parámetros de consulta inválidos: {}", e))
    })?;
    let schools = SchoolService::list_schools(state.store(), &access, filters).await?;
    Ok(Json(schools))
}

#[utoipa::path(
    post,
    path = "/api/schools",
    request_body = CreateSchoolDto,
    responses(
        (status = 201, description = "School created", body = School),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Missing create_schools_all", body = ErrorResponse),
        (status = 409, description = "A school with this name exists", body = ErrorResponse)
    ),
    tag = "Schools",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, access, dto))]
pub async fn create_school(
    State(state): State<AppState>,
    access: Access,
    ValidatedJson(dto): ValidatedJson<CreateSchoolDto>,
) -> Result<(StatusCode, Json<School>), AppError> {
    let school = SchoolService::create_school(state.store(), &access, dto).await?;
    Ok((StatusCode::CREATED, Json(school)))
}

#[utoipa::path(
    get,
    path = "/api/schools/{id}",
    params(("id" = SchoolId, Path, description = "School ID")),
    responses(
        (status = 200, description = "School details", body = School),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "School outside the caller's scope", body = ErrorResponse),
        (status = 404, description = "School not found", body = ErrorResponse)
    ),
    tag = "Schools",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, access))]
pub async fn get_school(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<SchoolId>,
) -> Result<Json<School>, AppError> {
    let school = SchoolService::get_school(state.store(), &access, id).await?;
    Ok(Json(school))
}

#[utoipa::path(
    patch,
    path = "/api/schools/{id}",
    params(("id" = SchoolId, Path, description = "School ID")),
    request_body = UpdateSchoolDto,
    responses(
        (status = 200, description = "School updated", body = School),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Missing edit_schools for this school", body = ErrorResponse),
        (status = 404, description = "School not found", body = ErrorResponse)
    ),
    tag = "Schools",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, access, dto))]
pub async fn update_school(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<SchoolId>,
    ValidatedJson(dto): ValidatedJson<UpdateSchoolDto>,
) -> Result<Json<School>, AppError> {
    let school = SchoolService::update_school(state.store(), &access, id, dto).await?;
    Ok(Json(school))
}

#[utoipa::path(
    get,
    path = "/api/schools/{id}/generations",
    params(("id" = SchoolId, Path, description = "School ID")),
    responses(
        (status = 200, description = "Generations of the school", body = Vec<Generation>),
        (status = 403, description = "School outside the caller's scope", body = ErrorResponse),
        (status = 404, description = "School not found", body = ErrorResponse)
    ),
    tag = "Schools",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, access))]
pub async fn get_generations(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<SchoolId>,
) -> Result<Json<Vec<Generation>>, AppError> {
    let generations = SchoolService::list_generations(state.store(), &access, id).await?;
    Ok(Json(generations))
}

#[utoipa::path(
    post,
    path = "/api/schools/{id}/generations",
    params(("id" = SchoolId, Path, description = "School ID")),
    request_body = CreateGenerationDto,
    responses(
        (status = 201, description = "Generation created", body = Generation),
        (status = 403, description = "Missing manage_generations for this school", body = ErrorResponse),
        (status = 404, description = "School not found", body = ErrorResponse),
        (status = 409, description = "Duplicate generation name", body = ErrorResponse)
    ),
    tag = "Schools",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, access, dto))]
pub async fn create_generation(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<SchoolId>,
    ValidatedJson(dto): ValidatedJson<CreateGenerationDto>,
) -> Result<(StatusCode, Json<Generation>), AppError> {
    let generation = SchoolService::create_generation(state.store(), &access, id, dto).await?;
    Ok((StatusCode::CREATED, Json(generation)))
}

#[utoipa::path(
    get,
    path = "/api/schools/{id}/communities",
    params(("id" = SchoolId, Path, description = "School ID")),
    responses(
        (status = 200, description = "Growth communities of the school", body = Vec<Community>),
        (status = 403, description = "School outside the caller's scope", body = ErrorResponse),
        (status = 404, description = "School not found", body = ErrorResponse)
    ),
    tag = "Schools",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, access))]
pub async fn get_communities(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<SchoolId>,
) -> Result<Json<Vec<Community>>, AppError> {
    let communities = SchoolService::list_communities(state.store(), &access, id).await?;
    Ok(Json(communities))
}

#[utoipa::path(
    post,
    path = "/api/schools/{id}/communities",
    params(("id" = SchoolId, Path, description = "School ID")),
    request_body = CreateCommunityDto,
    responses(
        (status = 201, description = "Community created", body = Community),
        (status = 400, description = "Generation missing or from another school", body = ErrorResponse),
        (status = 403, description = "Missing manage_communities for this school", body = ErrorResponse),
        (status = 404, description = "School not found", body = ErrorResponse),
        (status = 409, description = "Duplicate community name", body = ErrorResponse)
    ),
    tag = "Schools",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, access, dto))]
pub async fn create_community(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<SchoolId>,
    ValidatedJson(dto): ValidatedJson<CreateCommunityDto>,
) -> Result<(StatusCode, Json<Community>), AppError> {
    let community = SchoolService::create_community(state.store(), &access, id, dto).await?;
    Ok((StatusCode::CREATED, Json(community)))
}
