use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use parley_realtime::{ClientEvent, CloseReason, Connection, ConnectionState, ServerEvent};
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, timeout, MissedTickBehavior};
use utoipa::IntoParams;

use crate::{util::optional_bearer, ApiError, AppState};

/// Time the writer gets to flush queued frames once the connection closes.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Deserialize, IntoParams)]
pub struct WebSocketQuery {
    /// Session token. Falls back to the `Authorization` header when absent.
    token: Option<String>,
}

#[utoipa::path(
    get,
    path = "/ws",
    tag = "WebSocket",
    params(WebSocketQuery),
    responses(
        (status = 101, description = "Upgraded to the realtime event stream"),
        (status = 401, description = "Missing or invalid session", body = crate::error::ErrorResponse)
    )
)]
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WebSocketQuery>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let token = params.token.or_else(|| optional_bearer(&headers));
    let realtime = &state.settings().realtime;

    let mut connection = Connection::new(
        Arc::clone(state.registry()),
        realtime.channel_buffer_size,
    );
    connection
        .authenticate(state.authenticator(), token.as_deref())
        .await?;

    let idle_timeout = Duration::from_secs(realtime.idle_timeout_seconds);
    let shutdown = state.shutdown_receiver();
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, connection, idle_timeout, shutdown)))
}

async fn handle_socket(
    socket: WebSocket,
    mut connection: Connection,
    idle_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let outbound = match connection.activate() {
        Ok(outbound) => outbound,
        Err(error) => {
            tracing::error!(%error, "failed to activate websocket connection");
            return;
        }
    };
    let conn_id = connection.connection_id();
    let (ws_sender, mut ws_receiver) = socket.split();
    // Client Pongs count as inbound activity, so listeners are never idled out.
    let heartbeat = (idle_timeout / 2).max(MIN_HEARTBEAT_INTERVAL);
    let mut writer = tokio::spawn(write_events(ws_sender, outbound, heartbeat));

    let reason = loop {
        let next = tokio::select! {
            next = timeout(idle_timeout, ws_receiver.next()) => next,
            Ok(_) = shutdown.wait_for(|stopping| *stopping) => break CloseReason::ServerShutdown,
        };
        let frame = match next {
            Err(_) => break CloseReason::IdleTimeout,
            Ok(None) => break CloseReason::ClientClosed,
            Ok(Some(Err(error))) => {
                tracing::debug!(conn_id = ?conn_id, %error, "websocket transport error");
                break CloseReason::TransportError;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            WsMessage::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => {
                    if connection.handle_event(event) == ConnectionState::Closed {
                        break CloseReason::Logout;
                    }
                }
                Err(error) => {
                    tracing::warn!(conn_id = ?conn_id, %error, "invalid client event");
                    let _ = connection.push(ServerEvent::Error {
                        message: "Invalid event format".to_string(),
                    });
                }
            },
            WsMessage::Close(_) => break CloseReason::ClientClosed,
            // Ping/pong frames are answered by the transport; they still count as activity.
            _ => {}
        }
    };

    // Unregistering drops the last sender, which lets the writer drain and exit.
    connection.close(reason);
    drop(connection);

    if timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        tracing::debug!(conn_id = ?conn_id, "websocket writer did not finish, aborting");
        writer.abort();
    }
}

async fn write_events<S>(
    mut ws_sender: S,
    mut outbound: mpsc::Receiver<ServerEvent>,
    heartbeat: Duration,
) where
    S: futures_util::Sink<WsMessage> + Unpin,
    S::Error: std::fmt::Display,
{
    let mut heartbeat = interval(heartbeat);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately.
    heartbeat.tick().await;

    loop {
        let frame = tokio::select! {
            event = outbound.recv() => match event {
                Some(event) => match serde_json::to_string(&event) {
                    Ok(json) => WsMessage::Text(json),
                    Err(error) => {
                        tracing::error!(%error, "failed to encode server event");
                        continue;
                    }
                },
                None => break,
            },
            _ = heartbeat.tick() => WsMessage::Ping(Vec::new()),
        };
        if let Err(error) = ws_sender.send(frame).await {
            tracing::debug!(%error, "websocket send failed");
            return;
        }
    }
    let _ = ws_sender.close().await;
}
