use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;

use crate::server::admin::create_key_handler;
use crate::server::cors::cors_middleware;
use crate::server::handlers::{
    activate_handler, health_handler, info_handler, validate_handler, AppState,
};
use crate::server::logging::request_logging_middleware;

/// Build the main application router for the keysmith server.
///
/// This is a convenience helper so `main.rs` or tests can
/// construct the router in a single call.
///
/// # Routes
///
/// - `GET /` - Service description
/// - `GET /health` - Service and database health
/// - `POST /api/create-key` - Issue a key (admin credential required)
/// - `POST /api/activate` - Bind a key to a user
/// - `POST /api/validate` - Check a user's license for a script
///
/// Every response carries an `X-Request-Id` header and permissive CORS
/// headers; `OPTIONS` preflights are answered by the CORS layer.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(info_handler))
        .route("/health", get(health_handler))
        .route("/api/create-key", post(create_key_handler))
        .route("/api/activate", post(activate_handler))
        .route("/api/validate", post(validate_handler))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_logging_middleware))
                .layer(middleware::from_fn(cors_middleware)),
        )
        .with_state(state)
}
