//! HTTP surface: `/health`, `/`, and the `/ws` upgrade (spec §6).
//!
//! Built the way the teacher's `api::create_router` builds its own router —
//! a `TraceLayer`/`CompressionLayer`/`CorsLayer` stack over a
//! `Router<AppState>` — generalized from the teacher's many `.nest(...)`
//! routes down to the three this spec names. The CSM itself never touches
//! axum; this module is the only place a `Channel` is wired to a real socket.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::call::CallStatus;
use crate::csm::Csm;
use crate::events::ClientEvent;
use crate::ids::{CallId, UserId};
use crate::presence::PresenceEntry;
use crate::transport::Channel;

#[derive(Clone)]
pub struct AppState {
    pub csm: Arc<Csm>,
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(liveness))
        .route("/health", get(health))
        .route("/ws", get(ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

async fn liveness() -> &'static str {
    "OK"
}

/// `GET /health` snapshot shape (spec §6): connected user ids, active calls
/// (id, participants, status, bound participants), and the presence map.
#[derive(Serialize)]
struct HealthSnapshot {
    connected_user_ids: Vec<UserId>,
    calls: Vec<CallSummary>,
    presence: HashMap<UserId, PresenceEntry>,
}

#[derive(Serialize)]
struct CallSummary {
    call_id: CallId,
    participants: Vec<UserId>,
    bound_participants: Vec<UserId>,
    status: CallStatus,
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.csm.snapshot().await;
    Json(HealthSnapshot {
        connected_user_ids: snapshot.connected_user_ids,
        presence: snapshot.presence,
        calls: snapshot
            .calls
            .into_iter()
            .map(|call| CallSummary {
                call_id: call.call_id,
                participants: call.participants,
                bound_participants: call.bound_participants,
                status: call.status,
            })
            .collect(),
    })
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.csm))
}

/// Drive one connection for its lifetime: fan outbound [`ServerEvent`]s from
/// the channel's mailbox into the socket, and dispatch every inbound frame
/// into the CSM, until the socket closes in either direction.
async fn handle_socket(socket: WebSocket, csm: Arc<Csm>) {
    let (channel, mut outbound) = Channel::new();
    let (mut ws_tx, mut ws_rx) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                warn!("failed to serialize outbound event");
                continue;
            };
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    loop {
        tokio::select! {
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        dispatch_text(&csm, &channel, text.as_str()).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // binary/ping/pong: not part of the wire protocol
                    Some(Err(err)) => {
                        debug!(error = %err, "websocket read error");
                        break;
                    }
                }
            }
            _ = &mut writer => break,
        }
    }

    writer.abort();
    channel.close();
    csm.disconnect(&channel).await;
}

async fn dispatch_text(csm: &Arc<Csm>, channel: &Channel, text: &str) {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => csm.dispatch(channel, event).await,
        Err(err) => {
            warn!(error = %err, "dropping malformed inbound event");
        }
    }
}
