use axum::{
    Router,
    routing::{get, put},
};

use crate::state::AppState;

use super::controller::{create_assignment, delete_assignment, get_assignments, update_assignment};

pub fn init_consultants_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_assignments).post(create_assignment))
        .route("/{id}", put(update_assignment).delete(delete_assignment))
}
