use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

use super::controller::{
    create_community, create_generation, create_school, get_communities, get_generations,
    get_school, get_schools, update_school,
};

pub fn init_schools_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_school).get(get_schools))
        .route("/{id}", get(get_school).patch(update_school))
        .route("/{id}/generations", get(get_generations).post(create_generation))
        .route("/{id}/communities", get(get_communities).post(create_community))
}
