use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_governor::GovernorLayer;

use crate::middleware::rate_limit::rate_limited_response;
use crate::state::AppState;

use super::controller::{get_me, login_user};

pub fn init_auth_router(state: AppState) -> Router<AppState> {
    let login = match state.login_governor {
        Some(config) => post(login_user)
            .route_layer(GovernorLayer::new(config))
            .route_layer(middleware::map_response(rate_limited_response)),
        None => post(login_user),
    };

    Router::new()
        .route("/login", login)
        .route("/me", get(get_me))
}
