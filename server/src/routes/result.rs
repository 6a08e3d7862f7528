use axum::{routing::get, Extension, Router};

use crate::handlers::result_handlers::get_result;
use crate::state::AppState;

pub fn result_routes(state: AppState) -> Router {
    Router::new()
        .route("/result", get(get_result))
        .layer(Extension(state))
}
