use api_state::ApiState;
use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use routes::{
    command::handle_command, conversations::get_conversation_messages, liveness::live,
    readiness::ready,
};
use tower_http::cors::{Any, CorsLayer};

pub mod api_state;
pub mod error;
mod routes;

/// Router for the command API, version 1
pub fn api_routes_v1<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    Router::new()
        .route("/command", post(handle_command))
        .route(
            "/conversations/{conversation_id}/messages",
            get(get_conversation_messages),
        )
        .route("/ready", get(ready))
        .route("/live", get(live))
        .layer(permissive_cors())
}

// Browser clients call this API cross-origin; the layer answers the OPTIONS
// preflight before any handler runs.
fn permissive_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
