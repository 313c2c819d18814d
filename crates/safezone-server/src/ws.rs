//! WebSocket transport for location reports and live status updates.
//!
//! ## Protocol
//!
//! Clients connect to `/ws`. Every connection receives each status update
//! as a JSON object with `"event": "subject-location-update"`.
//!
//! ### Client Messages
//!
//! - `{"type": "location", "id": "...", "lat": ..., "lng": ...}` - submit a report
//! - `{"type": "init", "userType": "caregiver", "userId": ...}` - register as a
//!   caregiver to receive `{"type": "new-request", "data": {...}}` messages

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use safezone_core::LocationReport;
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::observers::ConnectionSender;
use crate::state::AppState;

/// User type that registers a connection as a caregiver.
pub const CAREGIVER_USER_TYPE: &str = "caregiver";

/// A message sent by a client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A location report.
    Location(LocationReport),

    /// Identify the connection.
    Init {
        /// Kind of user on this connection.
        #[serde(rename = "userType")]
        user_type: String,
        /// Id of that user.
        #[serde(rename = "userId")]
        user_id: ClientId,
    },
}

/// A user id sent either as a string or a number.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ClientId {
    /// Textual id.
    Text(String),
    /// Numeric id.
    Number(u64),
}

impl ClientId {
    /// The id in its string form.
    #[must_use]
    pub fn into_string(self) -> String {
        match self {
            Self::Text(id) => id,
            Self::Number(id) => id.to_string(),
        }
    }
}

/// WebSocket connection handler.
#[tracing::instrument(skip(state, ws))]
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let mut updates = state.hub().subscribe();
    let (direct_tx, mut direct_rx) = mpsc::unbounded_channel::<String>();

    info!(%connection_id, "Observer connected");

    let forward_task = tokio::spawn(async move {
        loop {
            let text = tokio::select! {
                result = updates.recv() => match result {
                    Ok(update) => match serde_json::to_string(&update) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(error = %e, "Failed to encode status update");
                            continue;
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(lagged = n, "WebSocket client lagged, status updates dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                direct = direct_rx.recv() => match direct {
                    Some(text) => text,
                    None => break,
                },
            };

            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                if let Err(e) =
                    handle_client_message(text.as_str(), connection_id, &direct_tx, &state).await
                {
                    warn!(%connection_id, error = %e, "Failed to handle WebSocket message");
                }
            }
            Message::Binary(_) => debug!("Ignoring binary WebSocket message"),
            Message::Ping(_) | Message::Pong(_) => trace!("Received ping/pong"),
            Message::Close(_) => {
                debug!(%connection_id, "Client closed WebSocket connection");
                break;
            }
        }
    }

    forward_task.abort();
    if let Some(caregiver_id) = state.caregivers().unregister_connection(connection_id) {
        info!(%connection_id, caregiver = %caregiver_id, "Caregiver disconnected");
    }
    info!(%connection_id, "Observer disconnected");
}

/// Act on one client message.
///
/// Location reports are processed inline, so reports on one connection are
/// handled in arrival order.
async fn handle_client_message(
    text: &str,
    connection_id: Uuid,
    direct_tx: &ConnectionSender,
    state: &AppState,
) -> Result<(), serde_json::Error> {
    match serde_json::from_str::<ClientMessage>(text)? {
        ClientMessage::Location(report) => {
            let outcome = state.processor().process(&report).await;
            trace!(%connection_id, ?outcome, "Location report handled");
        }
        ClientMessage::Init { user_type, user_id } if user_type == CAREGIVER_USER_TYPE => {
            let caregiver_id = user_id.into_string();
            state
                .caregivers()
                .register(&caregiver_id, connection_id, direct_tx.clone());
            info!(%connection_id, caregiver = %caregiver_id, "Caregiver registered");
        }
        ClientMessage::Init { user_type, .. } => {
            debug!(%connection_id, user_type = %user_type, "Connection identified");
        }
    }
    Ok(())
}
