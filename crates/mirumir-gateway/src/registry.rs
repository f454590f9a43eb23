use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error};
use uuid::Uuid;

use mirumir_types::events::BoardEvent;
use mirumir_types::models::BoardId;

pub type ConnectionId = Uuid;

/// Queue of serialized frames feeding one socket's writer task.
pub type Outbound = mpsc::UnboundedSender<String>;

/// Live WebSocket connections grouped by board.
///
/// Cheap to clone; every clone shares the same map. One instance is built at
/// startup and handed to the REST handlers and the socket sessions. Nothing
/// here is persisted, so a restart begins with an empty registry.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    /// board_id -> (conn_id -> outbound queue). Empty boards are never kept.
    boards: RwLock<HashMap<BoardId, HashMap<ConnectionId, Outbound>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an already-accepted socket to a board. Returns the id used to
    /// leave later or to exclude this connection from a broadcast.
    pub async fn join(&self, board_id: BoardId, outbound: Outbound) -> ConnectionId {
        let conn_id = Uuid::new_v4();
        self.inner
            .boards
            .write()
            .await
            .entry(board_id)
            .or_default()
            .insert(conn_id, outbound);
        conn_id
    }

    /// Remove a connection. The board entry is dropped once its last
    /// connection leaves. Returns false if the connection was not present.
    pub async fn leave(&self, board_id: BoardId, conn_id: ConnectionId) -> bool {
        let mut boards = self.inner.boards.write().await;
        let Some(connections) = boards.get_mut(&board_id) else {
            return false;
        };
        let removed = connections.remove(&conn_id).is_some();
        if connections.is_empty() {
            boards.remove(&board_id);
        }
        removed
    }

    /// Deliver an event to every connection on the board except `excluding`.
    ///
    /// A connection whose queue is closed has gone away; it is pruned here and
    /// delivery continues with the rest. Returns the number of connections
    /// the event was handed to.
    pub async fn broadcast(
        &self,
        board_id: BoardId,
        event: &BoardEvent,
        excluding: Option<ConnectionId>,
    ) -> usize {
        let frame = match serde_json::to_string(event) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to serialize {} event: {}", event.kind(), e);
                return 0;
            }
        };

        let mut boards = self.inner.boards.write().await;
        let Some(connections) = boards.get_mut(&board_id) else {
            return 0;
        };

        let mut delivered = 0;
        let mut departed = Vec::new();
        for (conn_id, outbound) in connections.iter() {
            if Some(*conn_id) == excluding {
                continue;
            }
            if outbound.send(frame.clone()).is_ok() {
                delivered += 1;
            } else {
                departed.push(*conn_id);
            }
        }

        for conn_id in departed {
            debug!("Pruning departed connection {} from board {}", conn_id, board_id);
            connections.remove(&conn_id);
        }
        if connections.is_empty() {
            boards.remove(&board_id);
        }

        delivered
    }

    /// Number of live connections on a board.
    pub async fn count(&self, board_id: BoardId) -> usize {
        self.inner
            .boards
            .read()
            .await
            .get(&board_id)
            .map_or(0, HashMap::len)
    }

    /// Number of boards with at least one live connection.
    pub async fn active_boards(&self) -> usize {
        self.inner.boards.read().await.len()
    }
}
