use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::state::SharedState;

/// Build the application router with all routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(api::chat))
        .route("/get_chat_list", get(api::list_chats))
        .route("/get_history", get(api::history))
        .route(
            "/memories",
            get(api::list_memories)
                .post(api::add_memory)
                .delete(api::delete_memory),
        )
        .route("/diary", get(api::list_diary).post(api::write_diary))
        .route("/rename_chat", post(api::rename_chat))
        .route("/delete_chat", post(api::delete_chat))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health() -> &'static str {
    "ok"
}
