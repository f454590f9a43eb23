//! Board sharing. Every endpoint here is owner-only.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use mirumir_types::Permission;
use mirumir_types::api::{
    Claims, ShareInfo, ShareListResponse, ShareRequest, ShareResponse, UpdateShareRequest,
    UpdateShareResponse,
};
use mirumir_types::models::{BoardId, UserId};

use crate::access::{check_grant_target, check_grantable, guard_board};
use crate::auth::{AppState, blocking};
use crate::error::ApiError;
use crate::extract::ApiJson;

/// Parse a requested level; only `view` and `edit` pass.
fn grantable(raw: &str) -> Result<Permission, ApiError> {
    let permission: Permission = raw
        .parse()
        .map_err(|_| ApiError::invalid_permission(format!("Invalid permission '{raw}'; use 'view' or 'edit'")))?;
    check_grantable(permission)?;
    Ok(permission)
}

pub async fn share_board(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(board_id): Path<BoardId>,
    ApiJson(req): ApiJson<ShareRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let owner_id = claims.sub;
    let grant = blocking(&state, move |s| {
        let (board, _) = guard_board(s, board_id, owner_id, Permission::Owner)?;

        let target = match (req.user_id, req.user_login.as_deref()) {
            (Some(user_id), _) => s.db.get_user_by_id(user_id)?,
            (None, Some(login)) => s.db.get_user_by_login(login)?,
            (None, None) => {
                return Err(ApiError::invalid_request("Either userId or userLogin is required"));
            }
        }
        .ok_or_else(ApiError::user_not_found)?;

        check_grant_target(&board, target.id)?;
        let permission = grantable(&req.permission)?;

        Ok(s.db.upsert_grant(board_id, target.id, permission, owner_id)?)
    })
    .await?;

    info!(
        "{} ({}) shared board {} with user {} as {}",
        claims.login, owner_id, board_id, grant.user_id, grant.permission
    );

    Ok(Json(ShareResponse {
        board_id: grant.board_id,
        user_id: grant.user_id,
        permission: grant.permission,
        granted_at: grant.granted_at,
        granted_by: grant.granted_by,
    }))
}

pub async fn list_shares(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(board_id): Path<BoardId>,
) -> Result<impl IntoResponse, ApiError> {
    let owner_id = claims.sub;
    let shares = blocking(&state, move |s| {
        guard_board(s, board_id, owner_id, Permission::Owner)?;
        Ok(s.db.list_grants_for_board(board_id)?)
    })
    .await?;

    Ok(Json(ShareListResponse {
        board_id,
        shares: shares
            .into_iter()
            .map(|share| ShareInfo {
                user_id: share.grant.user_id,
                user_login: share.user_login,
                permission: share.grant.permission,
                granted_at: share.grant.granted_at,
            })
            .collect(),
    }))
}

pub async fn update_share(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((board_id, user_id)): Path<(BoardId, UserId)>,
    ApiJson(req): ApiJson<UpdateShareRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let owner_id = claims.sub;
    let grant = blocking(&state, move |s| {
        let (board, _) = guard_board(s, board_id, owner_id, Permission::Owner)?;
        let permission = grantable(&req.permission)?;
        check_grant_target(&board, user_id)?;

        s.db
            .update_grant(board_id, user_id, permission, owner_id)?
            .ok_or_else(ApiError::grant_not_found)
    })
    .await?;

    Ok(Json(UpdateShareResponse {
        board_id: grant.board_id,
        user_id: grant.user_id,
        permission: grant.permission,
        updated_at: grant.granted_at,
    }))
}

pub async fn revoke_share(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((board_id, user_id)): Path<(BoardId, UserId)>,
) -> Result<impl IntoResponse, ApiError> {
    let owner_id = claims.sub;
    blocking(&state, move |s| {
        let (board, _) = guard_board(s, board_id, owner_id, Permission::Owner)?;
        check_grant_target(&board, user_id)?;
        if !s.db.delete_grant(board_id, user_id)? {
            return Err(ApiError::grant_not_found());
        }
        Ok(())
    })
    .await?;

    info!("{} ({}) revoked user {} from board {}", claims.login, owner_id, user_id, board_id);
    Ok(StatusCode::NO_CONTENT)
}
