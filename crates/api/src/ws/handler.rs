use axum::{
    extract::{Path, Query, State, WebSocketUpgrade, ws::{Message, WebSocket}},
    response::Response,
};
use futures::{SinkExt, StreamExt, stream::SplitSink};
use imhere_db::models::GeoPoint;
use imhere_services::{Session, room_code::normalize_room_code};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: String,
}

/// Messages a client may send on a room socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Location { lat: f64, lng: f64 },
    Ping,
}

type WsSender = SplitSink<WebSocket, Message>;

pub async fn ws_upgrade(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    // Verify JWT and membership before accepting the WebSocket
    let session = state.auth.session(&params.token)?;
    let code = normalize_room_code(&code);
    state.rooms.require_active_member(&code, &session.user_id).await?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, session, code)))
}

async fn send_json(sender: &mut WsSender, value: &serde_json::Value) -> Result<(), axum::Error> {
    sender.send(Message::text(value.to_string())).await
}

async fn handle_socket(socket: WebSocket, state: AppState, session: Session, code: String) {
    let connection_id = Uuid::new_v4().to_string();
    info!(user_id = %session.user_id, %code, %connection_id, "WebSocket connected");

    let (mut sender, mut receiver) = socket.split();

    let mut overview = match state.overview.watch(&code).await {
        Ok(sub) => sub,
        Err(e) => {
            warn!(%code, error = %e, "Failed to watch room");
            let _ = send_json(
                &mut sender,
                &serde_json::json!({ "type": "error", "message": e.to_string() }),
            )
            .await;
            return;
        }
    };

    let connected = serde_json::json!({
        "type": "connected",
        "user_id": session.user_id,
        "room": code,
    });
    if send_json(&mut sender, &connected).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            snapshot = overview.next() => match snapshot {
                Some(snapshot) => {
                    if let Err(e) = state.rooms.require_active_member(&code, &session.user_id).await {
                        info!(user_id = %session.user_id, %code, reason = %e, "Member no longer active, closing socket");
                        let _ = send_json(&mut sender, &serde_json::json!({ "type": "left", "room": code })).await;
                        break;
                    }
                    let event = serde_json::json!({ "type": "overview", "data": snapshot });
                    if send_json(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                None => {
                    let _ = send_json(&mut sender, &serde_json::json!({ "type": "room_gone" })).await;
                    break;
                }
            },
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if handle_client_message(&state, &session, &code, text.as_str(), &mut sender)
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    warn!(user_id = %session.user_id, %connection_id, %e, "WebSocket error");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    info!(user_id = %session.user_id, %code, %connection_id, "WebSocket disconnected");
}

async fn handle_client_message(
    state: &AppState,
    session: &Session,
    code: &str,
    text: &str,
    sender: &mut WsSender,
) -> Result<(), axum::Error> {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            debug!(user_id = %session.user_id, error = %e, "Unreadable WS message");
            return send_json(
                sender,
                &serde_json::json!({ "type": "error", "message": "Unsupported message" }),
            )
            .await;
        }
    };

    match message {
        ClientMessage::Ping => send_json(sender, &serde_json::json!({ "type": "pong" })).await,
        ClientMessage::Location { lat, lng } => {
            match state
                .rooms
                .update_location(session, code, GeoPoint::new(lat, lng))
                .await
            {
                Ok(()) => Ok(()),
                Err(e) => {
                    debug!(user_id = %session.user_id, %code, error = %e, "Rejected WS location");
                    send_json(
                        sender,
                        &serde_json::json!({ "type": "error", "message": e.to_string() }),
                    )
                    .await
                }
            }
        }
    }
}
