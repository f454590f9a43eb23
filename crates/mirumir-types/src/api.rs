use serde::{Deserialize, Serialize};

use crate::Permission;
use crate::models::{BoardId, StickerId, Timestamp, UserId};

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the WebSocket endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub login: String,
    pub exp: usize,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_id: UserId,
    pub login: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: UserId,
    pub login: String,
    pub token: String,
    pub expires_at: Timestamp,
}

// -- Boards --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateBoardRequest {
    pub title: String,
    pub description: Option<String>,
    pub background_color: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateBoardRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub background_color: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardFilter {
    Own,
    Shared,
    #[default]
    All,
}

#[derive(Debug, Default, Deserialize)]
pub struct BoardListQuery {
    #[serde(default)]
    pub filter: BoardFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardResponse {
    pub board_id: BoardId,
    pub title: String,
    pub description: Option<String>,
    pub owner_id: UserId,
    pub owner_name: Option<String>,
    pub background_color: Option<String>,
    pub is_public: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A board with its stickers and the caller's own access level.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardDetailResponse {
    #[serde(flatten)]
    pub board: BoardResponse,
    pub stickers: Vec<StickerResponse>,
    pub permission: Permission,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSummary {
    pub board_id: BoardId,
    pub title: String,
    pub description: Option<String>,
    pub owner_id: UserId,
    pub owner_name: Option<String>,
    pub is_public: bool,
    pub permission: Permission,
    pub sticker_count: u32,
    pub updated_at: Timestamp,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BoardListResponse {
    pub boards: Vec<BoardSummary>,
}

// -- Stickers --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateStickerRequest {
    pub x: f64,
    pub y: f64,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub color: Option<String>,
    pub text: Option<String>,
    #[serde(default)]
    pub layer_level: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateStickerRequest {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub color: Option<String>,
    pub text: Option<String>,
    pub layer_level: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StickerResponse {
    pub sticker_id: StickerId,
    pub board_id: BoardId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub text: Option<String>,
    pub layer_level: i64,
    pub color: String,
    pub created_by: UserId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// -- Sharing --

/// Target may be named by id or by login; at least one must be present.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ShareRequest {
    pub user_id: Option<UserId>,
    pub user_login: Option<String>,
    pub permission: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareResponse {
    pub board_id: BoardId,
    pub user_id: UserId,
    pub permission: Permission,
    pub granted_at: Timestamp,
    pub granted_by: UserId,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateShareRequest {
    pub permission: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateShareResponse {
    pub board_id: BoardId,
    pub user_id: UserId,
    pub permission: Permission,
    pub updated_at: Timestamp,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareInfo {
    pub user_id: UserId,
    pub user_login: String,
    pub permission: Permission,
    pub granted_at: Timestamp,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareListResponse {
    pub board_id: BoardId,
    pub shares: Vec<ShareInfo>,
}
