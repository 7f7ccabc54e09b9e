//! WebSocket push of job notifications.
//!
//! A client connects with its session id and receives every notification
//! published on the shared broadcast channel plus the ones addressed to its
//! own session.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use tubetone_core::Notification;

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Client session id
    pub c: Option<String>,
}

/// Which notifications a connection receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    broadcast_channel: String,
    session: Option<String>,
}

impl Subscription {
    pub fn new(broadcast_channel: impl Into<String>, session: Option<String>) -> Self {
        Self {
            broadcast_channel: broadcast_channel.into(),
            session: session.filter(|s| !s.trim().is_empty()),
        }
    }

    /// The route label for a matching notification, `None` when it is not ours.
    pub fn route(&self, notification: &Notification) -> Option<&'static str> {
        if notification.routing_key == self.broadcast_channel {
            Some("broadcast")
        } else if self.session.as_deref() == Some(notification.routing_key.as_str()) {
            Some("session")
        } else {
            None
        }
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<WsParams>,
) -> impl IntoResponse {
    let subscription = Subscription::new(
        state.config().worker.broadcast_channel.clone(),
        params.c,
    );
    ws.on_upgrade(move |socket| handle_socket(socket, state, subscription))
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, subscription: Subscription) {
    let (mut sender, mut receiver) = socket.split();

    let mut rx = state.notifier().subscribe();

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();

    info!(session = ?subscription.session, "WebSocket client connected");

    let send_task = tokio::spawn(async move {
        loop {
            let notification = match rx.recv().await {
                Ok(notification) => notification,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("WebSocket client lagged, skipped {} messages", n);
                    WS_LAG_EVENTS.inc();
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Notification channel closed");
                    break;
                }
            };

            let Some(route) = subscription.route(&notification) else {
                continue;
            };
            WS_MESSAGES_SENT.with_label_values(&[route]).inc();

            match serde_json::to_string(&notification) {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, client disconnected");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize notification: {}", e);
                }
            }
        }
    });

    // Clients only listen; drain until close.
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Text(text)) => {
                debug!("Ignoring client message: {}", text);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}
