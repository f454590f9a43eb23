use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use mirumir_db::models::{BoardChanges, BoardRow, NewBoard};
use mirumir_types::Permission;
use mirumir_types::api::{
    BoardDetailResponse, BoardListQuery, BoardListResponse, BoardResponse, BoardSummary, Claims,
    CreateBoardRequest, UpdateBoardRequest,
};
use mirumir_types::events::BoardEvent;
use mirumir_types::models::BoardId;

use crate::access::{self, guard_board};
use crate::auth::{AppState, blocking};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};
use crate::stickers::sticker_response;
use crate::validate;

pub(crate) fn board_response(row: &BoardRow) -> BoardResponse {
    BoardResponse {
        board_id: row.id,
        title: row.title.clone(),
        description: row.description.clone(),
        owner_id: row.creator_id,
        owner_name: row.owner_login.clone(),
        background_color: row.background_color.clone(),
        is_public: row.is_public,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

pub async fn create_board(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateBoardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate::title(&req.title)?;
    if let Some(description) = &req.description {
        validate::description(description)?;
    }
    if let Some(color) = &req.background_color {
        validate::hex_color("backgroundColor", color)?;
    }

    let user_id = claims.sub;
    let board = blocking(&state, move |s| {
        let board = s.db.create_board(&NewBoard {
            creator_id: user_id,
            title: &req.title,
            description: req.description.as_deref(),
            background_color: req.background_color.as_deref(),
            is_public: req.is_public,
        })?;
        Ok(board)
    })
    .await?;

    info!("{} ({}) created board {}", claims.login, user_id, board.id);
    Ok((StatusCode::CREATED, Json(board_response(&board))))
}

/// Boards the caller can see, each with the caller's resolved level.
///
/// Grants for the whole page are fetched in one query and resolution runs
/// against that cache.
pub async fn list_boards(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiQuery(query): ApiQuery<BoardListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let boards = blocking(&state, move |s| {
        let rows = s.db.list_boards_for_user(user_id, query.filter)?;
        let ids: Vec<BoardId> = rows.iter().map(|r| r.board.id).collect();
        let cache = access::build_cache(s.db.get_grants_for_user(user_id, &ids)?);

        let mut boards = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(permission) = access::resolve(&s.db, user_id, &row.board, Some(&cache))? else {
                continue;
            };
            boards.push(BoardSummary {
                board_id: row.board.id,
                title: row.board.title,
                description: row.board.description,
                owner_id: row.board.creator_id,
                owner_name: row.board.owner_login,
                is_public: row.board.is_public,
                permission,
                sticker_count: row.sticker_count,
                updated_at: row.board.updated_at,
            });
        }
        Ok(boards)
    })
    .await?;

    Ok(Json(BoardListResponse { boards }))
}

pub async fn get_board(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(board_id): Path<BoardId>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let detail = blocking(&state, move |s| {
        let (board, permission) = guard_board(s, board_id, user_id, Permission::View)?;
        let stickers = s.db.list_stickers(board_id)?;
        Ok(BoardDetailResponse {
            board: board_response(&board),
            stickers: stickers.iter().map(sticker_response).collect(),
            permission,
        })
    })
    .await?;

    Ok(Json(detail))
}

/// Serves both PUT and PATCH; absent fields are left as they are.
pub async fn update_board(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(board_id): Path<BoardId>,
    ApiJson(req): ApiJson<UpdateBoardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(title) = &req.title {
        validate::title(title)?;
    }
    if let Some(description) = &req.description {
        validate::description(description)?;
    }
    if let Some(color) = &req.background_color {
        validate::hex_color("backgroundColor", color)?;
    }

    let user_id = claims.sub;
    let board = blocking(&state, move |s| {
        guard_board(s, board_id, user_id, Permission::Edit)?;
        let changes = BoardChanges {
            title: req.title.as_deref(),
            description: req.description.as_deref(),
            background_color: req.background_color.as_deref(),
            is_public: req.is_public,
        };
        s.db
            .update_board(board_id, &changes)?
            .ok_or_else(ApiError::board_not_found)
    })
    .await?;

    let response = board_response(&board);
    state
        .registry
        .broadcast(board_id, &BoardEvent::BoardUpdated(response.clone()), None)
        .await;

    Ok(Json(response))
}

pub async fn delete_board(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(board_id): Path<BoardId>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    blocking(&state, move |s| {
        guard_board(s, board_id, user_id, Permission::Owner)?;
        if !s.db.delete_board(board_id)? {
            return Err(ApiError::board_not_found());
        }
        Ok(())
    })
    .await?;

    info!("{} ({}) deleted board {}", claims.login, user_id, board_id);
    state
        .registry
        .broadcast(board_id, &BoardEvent::BoardDeleted { board_id }, None)
        .await;

    Ok(StatusCode::NO_CONTENT)
}
