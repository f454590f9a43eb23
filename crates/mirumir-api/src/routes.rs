use axum::{
    Json, Router, middleware,
    routing::{get, patch, post, put},
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{boards, sharing, stickers, ws};

/// The whole HTTP surface: REST under `/api/v1`, the board socket, and `/health`.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/boards", get(boards::list_boards).post(boards::create_board))
        .route(
            "/boards/{board_id}",
            get(boards::get_board)
                .put(boards::update_board)
                .patch(boards::update_board)
                .delete(boards::delete_board),
        )
        .route("/boards/{board_id}/stickers", post(stickers::create_sticker))
        .route(
            "/boards/{board_id}/stickers/{sticker_id}",
            patch(stickers::update_sticker).delete(stickers::delete_sticker),
        )
        .route(
            "/boards/{board_id}/share",
            get(sharing::list_shares).post(sharing::share_board),
        )
        .route(
            "/boards/{board_id}/share/{user_id}",
            put(sharing::update_share).delete(sharing::revoke_share),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // Authenticates through the query string, not the middleware.
    let ws_routes = Router::new().route("/ws/boards/{board_id}", get(ws::board_socket));

    let api = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_routes);

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
