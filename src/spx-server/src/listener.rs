// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! WebSocket listener.
//!
//! One endpoint carries everything: binary spectrum/sweep frames go out,
//! JSON text commands come in, JSON status/event frames go out. On connect
//! the client immediately receives the current status snapshot. A malformed
//! command frame is answered with an error and otherwise ignored; the
//! connection stays up.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use spx_core::session::request::{SessionReply, SessionRequest};
use spx_core::session::state::StatusSnapshot;
use spx_protocol::codec::{parse_command, to_session_command};
use spx_protocol::types::ServerMessage;

use crate::broadcast::{ClientQueue, ClientRegistry, OutFrame};

#[derive(Clone)]
pub struct AppState {
    pub request_tx: mpsc::Sender<SessionRequest>,
    pub status_rx: watch::Receiver<StatusSnapshot>,
    pub clients: Arc<ClientRegistry>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (client_id, queue) = state.clients.add();
    info!("client {} connected, total: {}", client_id, state.clients.count());

    // Initial snapshot so a (re)connecting client can render immediately.
    let snapshot = state.status_rx.borrow().clone();
    let _ = queue.push_text(
        ServerMessage::Status {
            data: Box::new(snapshot),
        }
        .to_text(),
    );

    let (mut sink, mut stream) = socket.split();

    // Writer: drain the per-client queue into the socket.
    let writer_queue = Arc::clone(&queue);
    let writer = tokio::spawn(async move {
        while let Some(frame) = writer_queue.next().await {
            let msg = match frame {
                OutFrame::Binary(bytes) => Message::Binary(bytes.to_vec()),
                OutFrame::Text(text) => Message::Text(text),
            };
            if sink.send(msg).await.is_err() {
                writer_queue.close();
                break;
            }
        }
        let _ = sink.close().await;
    });

    // Reader: JSON command frames.
    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(m) => m,
            Err(e) => {
                debug!("client {} socket error: {}", client_id, e);
                break;
            }
        };
        match message {
            Message::Text(text) => {
                handle_command_text(&text, &state, &queue).await;
            }
            Message::Close(_) => break,
            Message::Binary(_) => {
                warn!("client {} sent unexpected binary frame", client_id);
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
        if queue.is_closed() {
            break;
        }
    }

    queue.close();
    state.clients.remove(client_id);
    let _ = writer.await;
    info!(
        "client {} disconnected, total: {}",
        client_id,
        state.clients.count()
    );
}

async fn handle_command_text(text: &str, state: &AppState, queue: &Arc<ClientQueue>) {
    let command = match parse_command(text) {
        Ok(cmd) => cmd,
        Err(e) => {
            // Malformed frame: log, answer with an error, keep the connection.
            warn!("invalid command frame: {} ({})", e, truncate(text, 120));
            let _ = queue.push_text(
                ServerMessage::error(format!("invalid command: {}", e)).to_text(),
            );
            return;
        }
    };

    let session_cmd = match to_session_command(command) {
        Ok(cmd) => cmd,
        Err(e) => {
            let _ = queue.push_text(ServerMessage::error(e.message).to_text());
            return;
        }
    };

    let (reply_tx, reply_rx) = oneshot::channel();
    if state
        .request_tx
        .send(SessionRequest {
            cmd: session_cmd,
            respond_to: reply_tx,
        })
        .await
        .is_err()
    {
        let _ = queue.push_text(
            ServerMessage::error("session coordinator unavailable").to_text(),
        );
        return;
    }

    let reply = match reply_rx.await {
        Ok(r) => r,
        Err(_) => {
            let _ = queue.push_text(
                ServerMessage::error("session coordinator dropped the request").to_text(),
            );
            return;
        }
    };

    let message = match reply {
        Ok(SessionReply::Status(snapshot)) => ServerMessage::Status { data: snapshot },
        Ok(SessionReply::Recordings(list)) => ServerMessage::Recordings { data: list },
        Ok(SessionReply::Device(probe)) => ServerMessage::Device { data: probe },
        Err(e) => ServerMessage::error(e.message),
    };
    let _ = queue.push_text(message.to_text());
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
