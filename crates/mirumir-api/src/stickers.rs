use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use mirumir_db::models::{NewSticker, StickerChanges, StickerRow};
use mirumir_types::Permission;
use mirumir_types::api::{Claims, CreateStickerRequest, StickerResponse, UpdateStickerRequest};
use mirumir_types::events::BoardEvent;
use mirumir_types::models::{BoardId, DEFAULT_STICKER_COLOR, DEFAULT_STICKER_SIZE, StickerId};

use crate::access::guard_board;
use crate::auth::{AppState, blocking};
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::validate;

pub(crate) fn sticker_response(row: &StickerRow) -> StickerResponse {
    StickerResponse {
        sticker_id: row.id,
        board_id: row.board_id,
        x: row.x,
        y: row.y,
        width: row.width,
        height: row.height,
        text: row.text.clone(),
        layer_level: row.layer_level,
        color: row.color.clone(),
        created_by: row.created_by,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn check_fields(
    width: Option<f64>,
    height: Option<f64>,
    color: Option<&str>,
    text: Option<&str>,
) -> Result<(), ApiError> {
    if let Some(width) = width {
        validate::sticker_size("width", width)?;
    }
    if let Some(height) = height {
        validate::sticker_size("height", height)?;
    }
    if let Some(color) = color {
        validate::hex_color("color", color)?;
    }
    if let Some(text) = text {
        validate::sticker_text(text)?;
    }
    Ok(())
}

pub async fn create_sticker(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(board_id): Path<BoardId>,
    ApiJson(req): ApiJson<CreateStickerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_fields(req.width, req.height, req.color.as_deref(), req.text.as_deref())?;

    let user_id = claims.sub;
    let sticker = blocking(&state, move |s| {
        guard_board(s, board_id, user_id, Permission::Edit)?;
        let sticker = s.db.create_sticker(&NewSticker {
            board_id,
            created_by: user_id,
            x: req.x,
            y: req.y,
            width: req.width.unwrap_or(DEFAULT_STICKER_SIZE),
            height: req.height.unwrap_or(DEFAULT_STICKER_SIZE),
            color: req.color.as_deref().unwrap_or(DEFAULT_STICKER_COLOR),
            text: req.text.as_deref().unwrap_or_default(),
            layer_level: req.layer_level,
        })?;
        Ok(sticker)
    })
    .await?;

    let response = sticker_response(&sticker);
    state
        .registry
        .broadcast(board_id, &BoardEvent::StickerCreated(response.clone()), None)
        .await;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn update_sticker(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((board_id, sticker_id)): Path<(BoardId, StickerId)>,
    ApiJson(req): ApiJson<UpdateStickerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_fields(req.width, req.height, req.color.as_deref(), req.text.as_deref())?;

    let user_id = claims.sub;
    let sticker = blocking(&state, move |s| {
        guard_board(s, board_id, user_id, Permission::Edit)?;
        let changes = StickerChanges {
            x: req.x,
            y: req.y,
            width: req.width,
            height: req.height,
            color: req.color.as_deref(),
            text: req.text.as_deref(),
            layer_level: req.layer_level,
        };
        s.db
            .update_sticker(board_id, sticker_id, &changes)?
            .ok_or_else(ApiError::sticker_not_found)
    })
    .await?;

    let response = sticker_response(&sticker);
    state
        .registry
        .broadcast(board_id, &BoardEvent::StickerUpdated(response.clone()), None)
        .await;

    Ok(Json(response))
}

pub async fn delete_sticker(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((board_id, sticker_id)): Path<(BoardId, StickerId)>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    blocking(&state, move |s| {
        guard_board(s, board_id, user_id, Permission::Edit)?;
        if !s.db.delete_sticker(board_id, sticker_id)? {
            return Err(ApiError::sticker_not_found());
        }
        Ok(())
    })
    .await?;

    state
        .registry
        .broadcast(board_id, &BoardEvent::StickerDeleted { sticker_id }, None)
        .await;

    Ok(StatusCode::NO_CONTENT)
}
