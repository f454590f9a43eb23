use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use mirumir_types::Permission;
use mirumir_types::events::{BoardEvent, ClientCommand};
use mirumir_types::models::{BoardId, UserId};

use crate::registry::{Outbound, Registry};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the session is closed.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

pub const CLOSE_AUTHENTICATION_FAILED: u16 = 4001;
pub const CLOSE_ACCESS_DENIED: u16 = 4003;

/// Why a socket was turned away before joining its board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    AuthenticationFailed,
    /// Board missing or the caller lacks view access; deliberately not told apart.
    AccessDenied,
}

impl Rejection {
    pub fn close_code(self) -> u16 {
        match self {
            Self::AuthenticationFailed => CLOSE_AUTHENTICATION_FAILED,
            Self::AccessDenied => CLOSE_ACCESS_DENIED,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "Authentication failed",
            Self::AccessDenied => "Board not found or access denied",
        }
    }
}

/// An authenticated, authorized viewer about to join a board.
#[derive(Debug, Clone)]
pub struct Member {
    pub board_id: BoardId,
    pub user_id: UserId,
    pub login: String,
    pub permission: Permission,
}

/// Close the socket with the rejection's code. The registry is never touched.
pub async fn reject(mut socket: WebSocket, rejection: Rejection) {
    let frame = CloseFrame {
        code: rejection.close_code(),
        reason: Utf8Bytes::from_static(rejection.reason()),
    };
    if let Err(e) = socket.send(Message::Close(Some(frame))).await {
        debug!("Failed to send close frame: {}", e);
    }
}

/// Drive one board session from join to close.
///
/// The socket joins the registry, the other viewers hear `user_joined`, and the
/// new socket alone gets `connected`. The session then answers `ping` frames
/// until the transport goes away, at which point it leaves the registry and
/// the remaining viewers hear `user_left`.
pub async fn run_session(socket: WebSocket, registry: Registry, member: Member) {
    run_session_with_heartbeat(socket, registry, member, HEARTBEAT_INTERVAL).await;
}

/// [`run_session`] with a custom ping interval.
pub async fn run_session_with_heartbeat(
    socket: WebSocket,
    registry: Registry,
    member: Member,
    heartbeat: Duration,
) {
    let (mut sender, receiver) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let board_id = member.board_id;

    let conn_id = registry.join(board_id, outbound_tx.clone()).await;
    let connection_count = registry.count(board_id).await;
    info!(
        "{} ({}) joined board {} [{} connected]",
        member.login, member.user_id, board_id, connection_count
    );

    registry
        .broadcast(
            board_id,
            &BoardEvent::UserJoined {
                user_id: member.user_id,
                user_login: member.login.clone(),
                connection_count,
            },
            Some(conn_id),
        )
        .await;

    let connected = BoardEvent::Connected {
        board_id,
        user_id: member.user_id,
        permission: member.permission,
        connection_count,
    };
    match serde_json::to_string(&connected) {
        Ok(text) => {
            if sender.send(Message::Text(text.into())).await.is_ok() {
                run_connection_loop(sender, receiver, outbound_rx, outbound_tx, &member, heartbeat)
                    .await;
            } else {
                debug!("{} ({}) went away before acknowledgement", member.login, member.user_id);
            }
        }
        Err(e) => warn!("Failed to serialize connected event: {}", e),
    }

    registry.leave(board_id, conn_id).await;
    let connection_count = registry.count(board_id).await;
    registry
        .broadcast(
            board_id,
            &BoardEvent::UserLeft {
                user_id: member.user_id,
                user_login: member.login.clone(),
                connection_count,
            },
            None,
        )
        .await;

    info!(
        "{} ({}) left board {} [{} connected]",
        member.login, member.user_id, board_id, connection_count
    );
}

/// Pump queued frames out and client frames in until either side stops.
async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    outbound_tx: Outbound,
    member: &Member,
    heartbeat_interval: Duration,
) {
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward broadcasts + replies -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(heartbeat_interval);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                frame = outbound_rx.recv() => {
                    let Some(frame) = frame else { break };
                    if sender.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping session", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read frames from client
    let label = format!("{} ({})", member.login, member.user_id);
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(ClientCommand::Ping) => {
                        let Ok(pong) = serde_json::to_string(&BoardEvent::Pong) else {
                            continue;
                        };
                        if outbound_tx.send(pong).is_err() {
                            break;
                        }
                    }
                    Err(_) => {
                        let preview: String = text.chars().take(200).collect();
                        trace!("{} sent unhandled frame: {}", label, preview);
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}
