use serde::{Deserialize, Serialize};

use crate::Permission;
use crate::api::{BoardResponse, StickerResponse};
use crate::models::{BoardId, StickerId, UserId};

/// Frames sent over a board WebSocket, enveloped as `{"type": .., "data": {..}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum BoardEvent {
    /// Private acknowledgement sent to a session once it has joined
    Connected {
        board_id: BoardId,
        user_id: UserId,
        permission: Permission,
        connection_count: usize,
    },

    /// Reply to a client `ping`
    Pong,

    UserJoined {
        user_id: UserId,
        user_login: String,
        connection_count: usize,
    },

    UserLeft {
        user_id: UserId,
        user_login: String,
        connection_count: usize,
    },

    StickerCreated(StickerResponse),

    StickerUpdated(StickerResponse),

    StickerDeleted { sticker_id: StickerId },

    BoardUpdated(BoardResponse),

    BoardDeleted { board_id: BoardId },
}

impl BoardEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Pong => "pong",
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
            Self::StickerCreated(_) => "sticker_created",
            Self::StickerUpdated(_) => "sticker_updated",
            Self::StickerDeleted { .. } => "sticker_deleted",
            Self::BoardUpdated(_) => "board_updated",
            Self::BoardDeleted { .. } => "board_deleted",
        }
    }
}

/// Frames accepted FROM the client. Anything that does not parse as one of
/// these is ignored by the session loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    Ping,
}
