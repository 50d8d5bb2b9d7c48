use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use genera_core::AppError;
use genera_models::ids::{NetworkId, SchoolId};
use genera_models::organizations::{
    CreateNetworkDto, Network, NetworkMembership, NetworkWithSchools, UpdateNetworkDto,
};

use crate::middleware::auth::Access;
use crate::modules::auth::controller::ErrorResponse;
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::service::NetworkService;

#[utoipa::path(
    get,
    path = "/api/networks",
    responses(
        (status = 200, description = "All networks", body = Vec<Network>),
        (status = 403, description = "Missing manage_networks", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Networks"
)]
#[instrument(skip(state, access))]
pub async fn get_networks(
    State(state): State<AppState>,
    access: Access,
) -> Result<Json<Vec<Network>>, AppError> {
    let networks = NetworkService::list_networks(state.store(), &access).await?;
    Ok(Json(networks))
}

#[utoipa::path(
    post,
    path = "/api/networks",
    request_body = CreateNetworkDto,
    responses(
        (status = 201, description = "Network created", body = Network),
        (status = 403, description = "Missing manage_networks", body = ErrorResponse),
        (status = 409, description = "A network with this name exists", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Networks"
)]
#[instrument(skip(state, access, dto))]
pub async fn create_network(
    State(state): State<AppState>,
    access: Access,
    ValidatedJson(dto): ValidatedJson<CreateNetworkDto>,
) -> Result<(StatusCode, Json<Network>), AppError> {
    let network = NetworkService::create_network(state.store(), &access, dto).await?;
    Ok((StatusCode::CREATED, Json(network)))
}

#[utoipa::path(
    put,
    path = "/api/networks/{id}",
    params(("id" = NetworkId, Path, description = "Network ID")),
    request_body = UpdateNetworkDto,
    responses(
        (status = 200, description = "Network updated", body = Network),
        (status = 403, description = "Missing manage_networks", body = ErrorResponse),
        (status = 404, description = "Network not found", body = ErrorResponse),
        (status = 409, description = "A network with this name exists", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Networks"
)]
#[instrument(skip(state, access, dto))]
pub async fn update_network(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<NetworkId>,
    ValidatedJson(dto): ValidatedJson<UpdateNetworkDto>,
) -> Result<Json<Network>, AppError> {
    let network = NetworkService::update_network(state.store(), &access, id, dto).await?;
    Ok(Json(network))
}

#[utoipa::path(
    delete,
    path = "/api/networks/{id}",
    params(("id" = NetworkId, Path, description = "Network ID")),
    responses(
        (status = 204, description = "Network and its memberships deleted"),
        (status = 403, description = "Missing manage_networks", body = ErrorResponse),
        (status = 404, description = "Network not found", body = ErrorResponse),
        (status = 409, description = "Supervisors are still assigned", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Networks"
)]
#[instrument(skip(state, access))]
pub async fn delete_network(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<NetworkId>,
) -> Result<StatusCode, AppError> {
    NetworkService::delete_network(state.store(), &access, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/networks/{id}/schools",
    params(("id" = NetworkId, Path, description = "Network ID")),
    responses(
        (status = 200, description = "Network with its schools", body = NetworkWithSchools),
        (status = 403, description = "Neither manager nor supervisor of this network", body = ErrorResponse),
        (status = 404, description = "Network not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Networks"
)]
#[instrument(skip(state, access))]
pub async fn get_network_schools(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<NetworkId>,
) -> Result<Json<NetworkWithSchools>, AppError> {
    let network = NetworkService::network_schools(state.store(), &access, id).await?;
    Ok(Json(network))
}

#[utoipa::path(
    put,
    path = "/api/networks/{id}/schools/{school_id}",
    params(
        ("id" = NetworkId, Path, description = "Network ID"),
        ("school_id" = SchoolId, Path, description = "School ID")
    ),
    responses(
        (status = 200, description = "Membership, existing or new", body = NetworkMembership),
        (status = 403, description = "Missing manage_networks", body = ErrorResponse),
        (status = 404, description = "Network or school not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Networks"
)]
#[instrument(skip(state, access))]
pub async fn add_network_school(
    State(state): State<AppState>,
    access: Access,
    Path((id, school_id)): Path<(NetworkId, SchoolId)>,
) -> Result<Json<NetworkMembership>, AppError> {
    let membership = NetworkService::add_school(state.store(), &access, id, school_id).await?;
    Ok(Json(membership))
}

#[utoipa::path(
    delete,
    path = "/api/networks/{id}/schools/{school_id}",
    params(
        ("id" = NetworkId, Path, description = "Network ID"),
        ("school_id" = SchoolId, Path, description = "School ID")
    ),
    responses(
        (status = 204, description = "School removed from the network"),
        (status = 403, description = "Missing manage_networks", body = ErrorResponse),
        (status = 404, description = "School is not a member", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Networks"
)]
#[instrument(skip(state, access))]
pub async fn remove_network_school(
    State(state): State<AppState>,
    access: Access,
    Path((id, school_id)): Path<(NetworkId, SchoolId)>,
) -> Result<StatusCode, AppError> {
    NetworkService::remove_school(state.store(), &access, id, school_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
