//! Real-time ticket chat channel.
//!
//! Each ticket gets a lazily-created broadcast channel; comment writes
//! publish a [`ChatEvent`] that WebSocket subscribers receive. Sends
//! are best-effort: with no subscribers the event is simply dropped.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::shared::enums::UserRole;
use crate::shared::error::ApiError;
use crate::shared::state::AppState;

pub type TicketChannels = Arc<tokio::sync::RwLock<HashMap<Uuid, broadcast::Sender<ChatEvent>>>>;

static TICKET_CHANNELS: std::sync::OnceLock<TicketChannels> = std::sync::OnceLock::new();

pub fn ticket_channels() -> &'static TicketChannels {
    TICKET_CHANNELS.get_or_init(|| Arc::new(tokio::sync::RwLock::new(HashMap::new())))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatUser {
    pub id: Uuid,
    pub name: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEvent {
    pub id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub user: ChatUser,
}

/// Publish a comment event on the ticket's channel, if anyone opened it.
pub async fn publish(ticket_id: Uuid, event: ChatEvent) {
    let channels = ticket_channels().read().await;
    if let Some(tx) = channels.get(&ticket_id) {
        let _ = tx.send(event);
    }
}

pub async fn ticket_ws(
    State(_state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(ticket_id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    debug!("ws subscribe ticket={ticket_id} user={}", auth.id);
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, ticket_id)))
}

async fn handle_socket(socket: WebSocket, ticket_id: Uuid) {
    let mut rx = {
        let mut channels = ticket_channels().write().await;
        channels
            .entry(ticket_id)
            .or_insert_with(|| broadcast::channel(100).0)
            .subscribe()
    };

    let (mut sender, mut receiver) = socket.split();
    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        let Ok(text) = serde_json::to_string(&event) else { continue };
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!("ws lagged {n} events on ticket {ticket_id}");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    // The channel is one-way; inbound frames are ignored.
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}
