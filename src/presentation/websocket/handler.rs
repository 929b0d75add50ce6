//! WebSocket Connection Handler
//!
//! Authenticates the upgrade, opens a serving session, and pumps frames
//! between the socket and the session's two channels.

use axum::{
    extract::{
        ws::{
            close_code, rejection::WebSocketUpgradeRejection, CloseFrame, Message as WsMessage,
            WebSocket,
        },
        Query, State, WebSocketUpgrade,
    },
    http::{header::AUTHORIZATION, HeaderMap},
    response::{IntoResponse, Response},
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::messages::{parse_frame, Inbound, ServerFrame};
use crate::application::services::SessionChannels;
use crate::presentation::middleware::decode_user_id;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Query string of the upgrade request
#[derive(Debug, Default, Deserialize)]
pub struct GatewayQuery {
    /// Browsers cannot set headers on a WebSocket handshake
    pub token: Option<String>,
}

/// WebSocket upgrade handler. Rejects with 401 before upgrading when the
/// token is missing or invalid.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, AppError> {
    let token = bearer_token(&headers)
        .or(query.token)
        .ok_or_else(|| AppError::Unauthorized("Missing token".into()))?;
    let user_id = decode_user_id(&token, &state.settings.jwt.secret)?;

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };
    let ws = ws
        .max_message_size(state.settings.websocket.max_message_size)
        .max_frame_size(state.settings.websocket.max_frame_size);

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id)))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
}

type WsSender = SplitSink<WebSocket, WsMessage>;

async fn send_frame(sender: &mut WsSender, frame: &ServerFrame) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(frame) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to serialize frame: {}", e);
            return Ok(());
        }
    };
    sender.send(WsMessage::Text(text.into())).await
}

async fn close_with_error(sender: &mut WsSender, reason: &'static str) {
    let frame = CloseFrame {
        code: close_code::ERROR,
        reason: reason.into(),
    };
    let _ = sender.send(WsMessage::Close(Some(frame))).await;
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState, user_id: i64) {
    let (mut sender, mut receiver) = socket.split();

    let SessionChannels {
        session_id,
        inbound,
        mut outbound,
        task,
    } = match state.messages.open_session(user_id).await {
        Ok(channels) => channels,
        Err(e) => {
            error!(user_id = user_id, error = %e, "Failed to open session");
            close_with_error(&mut sender, "session unavailable").await;
            return;
        }
    };

    let hello = ServerFrame::Hello {
        session_id,
        user_id: user_id.to_string(),
    };
    if let Err(e) = send_frame(&mut sender, &hello).await {
        debug!(session_id = %session_id, error = %e, "Failed to send hello");
        return;
    }

    info!(user_id = user_id, session_id = %session_id, "Gateway connected");

    // Replies that do not come from the session, e.g. pong
    let (control_tx, mut control_rx) = mpsc::unbounded_channel::<ServerFrame>();

    let mut writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                message = outbound.recv() => match message {
                    Some(message) => {
                        if send_frame(&mut sender, &ServerFrame::message(message)).await.is_err() {
                            return;
                        }
                    }
                    None => {
                        // Session ended while the socket is still open
                        close_with_error(&mut sender, "session ended").await;
                        return;
                    }
                },
                frame = control_rx.recv() => match frame {
                    Some(frame) => {
                        if send_frame(&mut sender, &frame).await.is_err() {
                            return;
                        }
                    }
                    None => return,
                },
            }
        }
    });

    loop {
        tokio::select! {
            msg = receiver.next() => match msg {
                Some(Ok(WsMessage::Text(text))) => match parse_frame(text.as_str()) {
                    Ok(Inbound::Send(request)) => {
                        if inbound.send(request).await.is_err() {
                            break;
                        }
                    }
                    Ok(Inbound::Ping) => {
                        let _ = control_tx.send(ServerFrame::Pong);
                    }
                    Err(e) => {
                        debug!(session_id = %session_id, error = %e, "Ignoring invalid frame");
                    }
                },
                Some(Ok(WsMessage::Close(_))) | None => {
                    debug!(session_id = %session_id, "Connection closed");
                    break;
                }
                Some(Err(e)) => {
                    debug!(session_id = %session_id, error = %e, "WebSocket error");
                    break;
                }
                // Ping/Pong control frames are handled by axum
                Some(Ok(_)) => {}
            },
            _ = &mut writer => break,
        }
    }

    // Writer goes first: a client-initiated close must not be answered with 1011.
    writer.abort();
    drop(inbound);

    match task.await {
        Ok(Ok(end)) => debug!(session_id = %session_id, end = ?end, "Session finished"),
        Ok(Err(e)) => warn!(session_id = %session_id, error = %e, "Session ended with error"),
        Err(e) => error!(session_id = %session_id, error = %e, "Session task failed"),
    }

    info!(user_id = user_id, session_id = %session_id, "Gateway disconnected");
}
