use crate::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Routes mounted under `/api`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(crate::api::handlers::health::health))
        .route("/agents", get(crate::api::handlers::agents::list_agents))
        .route("/turns", post(crate::api::handlers::turns::process_turn))
        .route(
            "/conversations/{user_id}",
            delete(crate::api::handlers::conversations::delete_conversation),
        )
        .route(
            "/conversations/{user_id}/reset",
            post(crate::api::handlers::conversations::reset_conversation),
        )
        .route(
            "/conversations/{user_id}/{agent}",
            get(crate::api::handlers::conversations::get_conversation),
        )
        .route("/usage", get(crate::api::handlers::usage::get_usage))
        .route("/openapi.json", get(crate::api::docs::openapi_json))
}

/// The full application: `/api` routes with request tracing and CORS.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .nest("/api", create_router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
