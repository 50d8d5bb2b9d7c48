use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::modules::roles::init_user_roles_router;
use crate::state::AppState;

use super::controller::{
    create_user, delete_user, get_user, get_users, update_approval, update_user,
};

pub fn init_users_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_user).get(get_users))
        .route(
            "/{id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/{id}/approval", patch(update_approval))
        .merge(init_user_roles_router())
}
