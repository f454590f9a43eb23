use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{error, info};

use mirumir_gateway::connection::{self, Member, Rejection};
use mirumir_types::Permission;
use mirumir_types::models::BoardId;

use crate::access::{self, AccessError};
use crate::auth::{AppState, blocking, decode_token};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct SocketQuery {
    pub token: Option<String>,
}

/// `GET /api/v1/ws/boards/{board_id}?token=...`
///
/// The upgrade is always accepted; a caller that fails authentication or has
/// no view access is then closed with 4001 or 4003.
pub async fn board_socket(
    State(state): State<AppState>,
    Path(board_id): Path<BoardId>,
    Query(query): Query<SocketQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        match admit(&state, board_id, query.token).await {
            Ok(member) => connection::run_session(socket, state.registry.clone(), member).await,
            Err(rejection) => {
                info!("Rejected socket for board {}: {}", board_id, rejection.reason());
                connection::reject(socket, rejection).await;
            }
        }
    })
}

async fn admit(state: &AppState, board_id: BoardId, token: Option<String>) -> Result<Member, Rejection> {
    let claims = token
        .as_deref()
        .and_then(|t| decode_token(&state.jwt_secret, t).ok())
        .ok_or(Rejection::AuthenticationFailed)?;

    let user_id = claims.sub;
    let outcome = blocking(state, move |s| {
        let Some(user) = s.db.get_user_by_id(user_id)? else {
            return Ok(Err(Rejection::AuthenticationFailed));
        };
        let Some(board) = s.db.get_board(board_id)? else {
            return Ok(Err(Rejection::AccessDenied));
        };
        match access::require(&s.db, user.id, &board, None, Permission::View) {
            Ok(permission) => Ok(Ok(Member {
                board_id,
                user_id: user.id,
                login: user.login,
                permission,
            })),
            Err(AccessError::Store(e)) => Err(ApiError::Internal(e)),
            Err(_) => Ok(Err(Rejection::AccessDenied)),
        }
    })
    .await;

    match outcome {
        Ok(result) => result,
        Err(e) => {
            error!("Socket admission for board {} failed: {}", board_id, e);
            Err(Rejection::AccessDenied)
        }
    }
}
