use axum::{
    Router,
    routing::{delete, get},
};

use crate::state::AppState;

use super::controller::{assign_role, get_roles, get_user_roles, remove_role};

pub fn init_roles_router() -> Router<AppState> {
    Router::new().route("/", get(get_roles))
}

/// Assignment routes, merged into the users router under `/{id}/roles`.
pub fn init_user_roles_router() -> Router<AppState> {
    Router::new()
        .route("/{id}/roles", get(get_user_roles).post(assign_role))
        .route("/{id}/roles/{assignment_id}", delete(remove_role))
}
