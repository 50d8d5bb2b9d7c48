use axum::{
    Router,
    routing::{get, put},
};

use crate::state::AppState;

use super::controller::{
    add_network_school, create_network, delete_network, get_network_schools, get_networks,
    remove_network_school, update_network,
};

pub fn init_networks_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_networks).post(create_network))
        .route("/{id}", put(update_network).delete(delete_network))
        .route("/{id}/schools", get(get_network_schools))
        .route(
            "/{id}/schools/{school_id}",
            put(add_network_school).delete(remove_network_school),
        )
}
