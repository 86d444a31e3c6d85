use axum::{
    Router,
    routing::{get, post},
};

pub mod intents;
pub mod system;

/// Router for all identity-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/intents", post(intents::process_intent))
        .route("/stats", get(intents::stats))
}
