use axum::{
    Router,
    routing::{get, put},
};

use crate::state::AppState;

use super::controller::{check_permission, get_audit, get_catalog, get_matrix, update_permission};

pub fn init_permissions_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_catalog))
        .route("/check", get(check_permission))
        .route("/matrix", get(get_matrix))
        .route("/matrix/{role_type}/{permission_key}", put(update_permission))
        .route("/audit", get(get_audit))
}
