//! # huddle-gateway
//!
//! Realtime fan-out for Huddle. Handles:
//! - The in-process [`hub::BroadcastHub`] that the API publishes message
//!   mutations into
//! - Client sockets at `/api/socket/io`: identify, per-scope subscribe and
//!   unsubscribe, heartbeat
//!
//! Delivery is best-effort. A socket only sees events published while it is
//! subscribed; clients that reconnect refetch history over HTTP.

pub mod events;
pub mod hub;

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
    routing::get,
};
use events::{ClientFrame, HEARTBEAT_INTERVAL_MS, ServerFrame};
use futures_util::{SinkExt, StreamExt};
use huddle_common::gateway_event::Topic;
use huddle_common::models::{MessageScope, Profile, ProfileSummary};
use huddle_db::repository::{members, profiles};
use hub::BroadcastHub;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Gateway state.
#[derive(Clone)]
pub struct GatewayState {
    pub db: huddle_db::Database,
    pub hub: BroadcastHub,
    /// HS256 secret shared with the identity provider
    pub jwt_secret: String,
}

impl GatewayState {
    pub fn new(db: huddle_db::Database, hub: BroadcastHub, jwt_secret: impl Into<String>) -> Self {
        Self {
            db,
            hub,
            jwt_secret: jwt_secret.into(),
        }
    }
}

/// Build the gateway WebSocket router.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/api/socket/io", get(ws_handler))
        .with_state(Arc::new(state))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<GatewayState>>) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

/// Handle a single WebSocket connection.
async fn handle_connection(socket: WebSocket, state: Arc<GatewayState>) {
    let (mut sender, mut receiver) = socket.split();
    let session_id = uuid::Uuid::new_v4().to_string();

    // Every outbound frame (replies and forwarded events) goes through this
    // queue so only the sender task touches the sink.
    let (direct_tx, mut direct_rx) = mpsc::channel::<ServerFrame>(64);

    let hello = ServerFrame::Hello {
        heartbeat_interval: HEARTBEAT_INTERVAL_MS,
    };
    if sender.send(Message::Text(hello.to_json().into())).await.is_err() {
        return;
    }

    // ── Sender task ──────────────────────────────────────────────────────────
    let send_task = tokio::spawn(async move {
        while let Some(frame) = direct_rx.recv().await {
            if sender.send(Message::Text(frame.to_json().into())).await.is_err() {
                break;
            }
        }
    });

    // ── Receive loop ─────────────────────────────────────────────────────────
    let mut session = Session {
        profile: None,
        forwards: HashMap::new(),
    };

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                let Ok(frame) = serde_json::from_str::<ClientFrame>(&text) else {
                    tracing::debug!(session = %session_id, "Ignoring malformed frame");
                    continue;
                };
                let reply = session.handle(frame, &state, &direct_tx, &session_id).await;
                if direct_tx.send(reply).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // ── Cleanup ───────────────────────────────────────────────────────────────
    session.unsubscribe_all();
    drop(direct_tx);
    send_task.abort();
    tracing::info!(session = %session_id, "Client disconnected from gateway");
}

/// Per-connection state owned by the receive loop.
struct Session {
    profile: Option<Profile>,
    /// One forwarding task per subscribed topic. Aborting a task drops its
    /// hub subscription.
    forwards: HashMap<Topic, JoinHandle<()>>,
}

impl Session {
    async fn handle(
        &mut self,
        frame: ClientFrame,
        state: &GatewayState,
        direct_tx: &mpsc::Sender<ServerFrame>,
        session_id: &str,
    ) -> ServerFrame {
        match frame {
            ClientFrame::Identify { token } => {
                let claims = match huddle_common::auth::validate_token(&token, &state.jwt_secret) {
                    Ok(claims) => claims,
                    Err(_) => return ServerFrame::InvalidSession,
                };
                let profile = match profiles::upsert(
                    &state.db.pool,
                    &claims.sub,
                    &claims.name,
                    claims.picture.as_deref(),
                    claims.email.as_deref(),
                )
                .await
                {
                    Ok(profile) => profile,
                    Err(e) => {
                        tracing::error!(session = %session_id, error = %e, "Profile lookup failed");
                        return ServerFrame::Error {
                            message: "An internal error occurred".into(),
                        };
                    }
                };

                tracing::info!(session = %session_id, profile = %profile.id, "Gateway READY sent");
                let summary = ProfileSummary::from(&profile);
                self.profile = Some(profile);
                ServerFrame::Ready {
                    session_id: session_id.to_string(),
                    profile: summary,
                }
            }

            ClientFrame::Subscribe { scope } => {
                let Some(profile_id) = self.profile.as_ref().map(|p| p.id) else {
                    return ServerFrame::InvalidSession;
                };
                match self.subscribe(scope, profile_id, state, direct_tx).await {
                    Ok(topic) => ServerFrame::Subscribed { topic: topic.key() },
                    Err(message) => ServerFrame::Error { message },
                }
            }

            ClientFrame::Unsubscribe { scope } => {
                let topic = Topic::from(scope);
                if let Some(task) = self.forwards.remove(&topic) {
                    task.abort();
                }
                ServerFrame::Unsubscribed { topic: topic.key() }
            }

            ClientFrame::Heartbeat { .. } => ServerFrame::HeartbeatAck {
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        }
    }

    async fn subscribe(
        &mut self,
        scope: MessageScope,
        profile_id: uuid::Uuid,
        state: &GatewayState,
        direct_tx: &mpsc::Sender<ServerFrame>,
    ) -> Result<Topic, String> {
        let topic = Topic::from(scope);
        if self.forwards.contains_key(&topic) {
            return Ok(topic);
        }

        match members::find_for_scope(&state.db.pool, scope, profile_id).await {
            Ok(Some(_)) => {}
            Ok(None) => return Err("Unauthorized".into()),
            Err(e) => {
                tracing::error!(topic = %topic.key(), error = %e, "Access check failed");
                return Err("An internal error occurred".into());
            }
        }

        // Register with the hub before replying, so nothing published after
        // the client sees `Subscribed` can be missed.
        let mut subscription = state.hub.subscribe(topic);
        let tx = direct_tx.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                if tx.send(ServerFrame::Dispatch { event }).await.is_err() {
                    break;
                }
            }
        });
        self.forwards.insert(topic, task);
        Ok(topic)
    }

    fn unsubscribe_all(&mut self) {
        for (_, task) in self.forwards.drain() {
            task.abort();
        }
    }
}
