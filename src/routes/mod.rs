pub mod chat_routes;
pub mod saved_data_routes;

use std::sync::Arc;

use axum::extract::FromRef;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::SessionVerifier;
use crate::service::{ChatService, SavedDataService};

use chat_routes::{delete_chat_handler, get_chat_handler, send_message_handler};
use saved_data_routes::{
    create_saved_data_handler, delete_saved_data_handler, get_saved_data_handler,
    patch_saved_data_handler,
};

/// Everything a handler may need; each piece is built once in `main`.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub chat: ChatService,
    pub saved_data: SavedDataService,
    pub sessions: Arc<dyn SessionVerifier>,
}

pub fn router(state: AppState) -> Router {
    let saved_data = get(get_saved_data_handler)
        .patch(patch_saved_data_handler)
        .delete(delete_saved_data_handler)
        .post(create_saved_data_handler);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/api/chat",
            post(send_message_handler).get(get_chat_handler).delete(delete_chat_handler),
        )
        .route("/api/saved-data", saved_data.clone())
        .route("/api/reservation", saved_data)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
