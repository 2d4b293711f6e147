mod error;
mod handlers;
mod middleware;
mod state;

pub use error::ApiError;
pub use middleware::RequestContext;
pub use state::HttpState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use middleware::{log_responses, set_request_context};

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(handlers::liveness))
        .route("/handle_task", post(handlers::handle_task))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
