use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_database::AppContext;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn patient_routes(state: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", post(handlers::create_patient).get(handlers::search_patients))
        .route("/me", get(handlers::get_my_profile))
        .route("/{patient_id}", get(handlers::get_patient).put(handlers::update_patient))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
