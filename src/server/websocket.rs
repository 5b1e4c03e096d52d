//! WebSocket route handler.
//!
//! Handles the upgrade, the message loop and cleanup. Clients join item rooms
//! to receive comment events; chart events reach every connection.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::state::GuardedConnectionManager;
use crate::realtime::messages::system;
use crate::realtime::{
    is_valid_room, msg_types, Broadcaster, ClientMessage, ConnectionManager, ServerMessage,
};

/// Route handler for `GET /v1/ws`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(connection_manager): State<GuardedConnectionManager>,
) -> Response {
    if !connection_manager.is_running() {
        warn!("WebSocket upgrade refused, broadcaster is stopped");
        return (StatusCode::SERVICE_UNAVAILABLE, "Realtime channel unavailable").into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, connection_manager))
}

async fn handle_socket(socket: WebSocket, connection_manager: GuardedConnectionManager) {
    let Some((connection_id, outgoing_rx)) = connection_manager.register().await else {
        debug!("Broadcaster stopped during upgrade, closing socket");
        return;
    };
    debug!("WebSocket connected: {}", connection_id);

    let (ws_sink, ws_stream) = socket.split();

    let connected_msg = ServerMessage::new(
        msg_types::CONNECTED,
        system::Connected {
            connection_id,
            server_version: env!("CARGO_PKG_VERSION").to_string(),
        },
    );

    let outgoing_handle = tokio::spawn(forward_outgoing(ws_sink, outgoing_rx, connected_msg));

    process_incoming(ws_stream, connection_id, &connection_manager).await;

    debug!("WebSocket disconnected: {}", connection_id);
    outgoing_handle.abort();
    connection_manager.unregister(connection_id).await;
}

/// Forward messages from the outgoing channel to the WebSocket.
async fn forward_outgoing(
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut outgoing_rx: mpsc::Receiver<ServerMessage>,
    initial_msg: ServerMessage,
) {
    if let Ok(json) = serde_json::to_string(&initial_msg) {
        if ws_sink.send(Message::Text(json.into())).await.is_err() {
            return;
        }
    }

    while let Some(msg) = outgoing_rx.recv().await {
        match serde_json::to_string(&msg) {
            Ok(json) => {
                if ws_sink.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                error!("Failed to serialize WebSocket message: {}", e);
            }
        }
    }
    // The broadcaster dropped our sender: it stopped or unregistered us.
    let _ = ws_sink.send(Message::Close(None)).await;
}

async fn process_incoming(
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    connection_id: usize,
    manager: &ConnectionManager,
) {
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => handle_client_message(connection_id, msg, manager).await,
                Err(e) => {
                    debug!("Failed to parse client message: {}", e);
                    send_error(
                        manager,
                        connection_id,
                        "parse_error",
                        format!("Invalid message format: {}", e),
                    )
                    .await;
                }
            },
            Ok(Message::Binary(_)) => {
                debug!("Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                debug!("Received close frame");
                break;
            }
            Err(e) => {
                debug!("WebSocket error: {}", e);
                break;
            }
        }
    }
}

async fn handle_client_message(connection_id: usize, msg: ClientMessage, manager: &ConnectionManager) {
    match msg.msg_type.as_str() {
        msg_types::PING => {
            let _ = manager
                .send_to(connection_id, ServerMessage::empty(msg_types::PONG))
                .await;
        }
        msg_types::JOIN | msg_types::LEAVE => {
            let room = match serde_json::from_value::<system::Room>(msg.payload) {
                Ok(payload) if is_valid_room(&payload.room) => payload.room,
                Ok(payload) => {
                    send_error(
                        manager,
                        connection_id,
                        "invalid_room",
                        format!("Invalid room name: {}", payload.room),
                    )
                    .await;
                    return;
                }
                Err(e) => {
                    send_error(
                        manager,
                        connection_id,
                        "invalid_payload",
                        format!("Invalid {} payload: {}", msg.msg_type, e),
                    )
                    .await;
                    return;
                }
            };

            let reply = if msg.msg_type == msg_types::JOIN {
                manager.join(connection_id, &room).await;
                msg_types::ROOM_JOINED
            } else {
                manager.leave(connection_id, &room).await;
                msg_types::ROOM_LEFT
            };
            debug!("Connection {} {} {}", connection_id, reply, room);
            let _ = manager
                .send_to(connection_id, ServerMessage::new(reply, system::Room { room }))
                .await;
        }
        other => {
            debug!("Unknown message type: {}", other);
            send_error(
                manager,
                connection_id,
                "unknown_type",
                format!("Unknown message type: {}", other),
            )
            .await;
        }
    }
}

async fn send_error(manager: &ConnectionManager, connection_id: usize, code: &str, message: String) {
    let error_msg = ServerMessage::new(msg_types::ERROR, system::Error::new(code, message));
    let _ = manager.send_to(connection_id, error_msg).await;
}
