//! Database row types. These map directly to SQLite rows.
//! Distinct from mirumir-types API models to keep the DB layer independent.

use mirumir_types::Permission;
use mirumir_types::models::{BoardId, StickerId, Timestamp, UserId};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: UserId,
    pub login: String,
    pub password: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct BoardRow {
    pub id: BoardId,
    pub creator_id: UserId,
    /// Creator's login, joined in for responses.
    pub owner_login: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub background_color: Option<String>,
    pub is_public: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct BoardListRow {
    pub board: BoardRow,
    pub sticker_count: u32,
}

#[derive(Debug, Clone)]
pub struct StickerRow {
    pub id: StickerId,
    pub board_id: BoardId,
    pub created_by: UserId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: String,
    pub text: Option<String>,
    pub layer_level: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GrantRow {
    pub board_id: BoardId,
    pub user_id: UserId,
    pub permission: Permission,
    pub granted_by: UserId,
    pub granted_at: Timestamp,
}

/// A grant joined with the grantee's login, for share listings.
#[derive(Debug, Clone)]
pub struct ShareRow {
    pub grant: GrantRow,
    pub user_login: String,
}

// -- Write-side inputs --

pub struct NewBoard<'a> {
    pub creator_id: UserId,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub background_color: Option<&'a str>,
    pub is_public: bool,
}

/// Partial board update; `None` leaves a column untouched.
#[derive(Default)]
pub struct BoardChanges<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub background_color: Option<&'a str>,
    pub is_public: Option<bool>,
}

pub struct NewSticker<'a> {
    pub board_id: BoardId,
    pub created_by: UserId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: &'a str,
    pub text: &'a str,
    pub layer_level: i64,
}

/// Partial sticker update; `None` leaves a column untouched.
#[derive(Default)]
pub struct StickerChanges<'a> {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub color: Option<&'a str>,
    pub text: Option<&'a str>,
    pub layer_level: Option<i64>,
}
