//! Socket endpoint.
//!
//! The first frame from the peer must be a text frame carrying a signed
//! identity token. After that the peer may send uploads as pairs of
//! frames: a JSON [`UploadHeader`] text frame followed by one body frame.
//! Each stored upload is answered with an [`UploadReceipt`] written through
//! the same writer that relays notifications.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::response::Response;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{FutureExt, SinkExt, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use courier_core::error::{AppError, ErrorKind};
use courier_core::result::AppResult;
use courier_core::types::UserHash;
use courier_realtime::message::{UploadHeader, UploadReceipt};
use courier_realtime::{ConnectionWriter, FrameTransport, IngestService, InboundTask, Outbound};

use crate::error::UNAUTHORIZED_MESSAGE;
use crate::state::AppState;

/// GET /ws
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

/// Write half of an upgraded socket.
pub struct WsTransport {
    sink: SplitSink<WebSocket, Message>,
}

impl WsTransport {
    /// Wraps the write half of a socket.
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl FrameTransport for WsTransport {
    fn kind(&self) -> &'static str {
        "socket"
    }

    async fn write(&mut self, frame: Outbound) -> AppResult<()> {
        let message = match frame {
            Outbound::Text(text) => Message::Text(text.into()),
            // Payloads that are valid UTF-8 go out as text frames.
            Outbound::Payload(data) => match String::from_utf8(data.to_vec()) {
                Ok(text) => Message::Text(text.into()),
                Err(_) => Message::Binary(data),
            },
        };
        self.sink.send(message).await.map_err(|e| {
            AppError::with_source(ErrorKind::ServiceUnavailable, "Socket write failed", e)
        })
    }

    async fn close(&mut self) {
        let _ = self.sink.close().await;
    }
}

/// Waits for the first data frame, skipping pings.
async fn first_frame(stream: &mut SplitStream<WebSocket>) -> Option<Message> {
    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => return None,
            other => return Some(other),
        }
    }
    None
}

async fn reject(mut sink: SplitSink<WebSocket, Message>, code: u16, reason: &str) {
    let frame = CloseFrame {
        code,
        reason: reason.to_string().into(),
    };
    let _ = sink.send(Message::Close(Some(frame))).await;
    let _ = sink.close().await;
}

/// Authenticates the socket, then hands it to the engine.
async fn handle_socket(state: AppState, socket: WebSocket) {
    let (sink, mut stream) = socket.split();
    let auth_timeout = Duration::from_secs(state.engine.config().auth_timeout_seconds);

    let token = match tokio::time::timeout(auth_timeout, first_frame(&mut stream)).await {
        Ok(Some(Message::Text(token))) => token.as_str().to_string(),
        Ok(Some(_)) => {
            warn!(route = "/ws", reason = "non_text_first_frame", "Authentication rejected");
            reject(sink, close_code::POLICY, UNAUTHORIZED_MESSAGE).await;
            return;
        }
        Ok(None) => {
            debug!("Socket closed before authenticating");
            return;
        }
        Err(_) => {
            warn!(route = "/ws", reason = "auth_timeout", "Authentication rejected");
            reject(sink, close_code::POLICY, UNAUTHORIZED_MESSAGE).await;
            return;
        }
    };

    let identity = match state.authenticator.verify_identity_token(&token).await {
        Ok(identity) => identity,
        Err(e) => {
            warn!(route = "/ws", reason = e.label(), "Authentication rejected");
            reject(sink, close_code::POLICY, UNAUTHORIZED_MESSAGE).await;
            return;
        }
    };

    let conn = match state.engine.open(identity).await {
        Ok(conn) => conn,
        Err(e) => {
            warn!(reason = e.label(), error = %e, "Socket connection could not be provisioned");
            reject(sink, close_code::AGAIN, "try again later").await;
            return;
        }
    };

    let conn_id = conn.conn_id;
    let user_hash = conn.user_hash.clone();
    info!(
        conn_id = %conn_id,
        user_hash = %user_hash,
        subscription = conn.subscription(),
        "Socket connection opened"
    );

    let ingest = Arc::clone(&state.engine.ingest);
    let inbound: InboundTask = Box::new(
        move |writer: ConnectionWriter, cancel: CancellationToken| {
            read_uploads(stream, writer, cancel, ingest, user_hash).boxed()
        },
    );

    if let Err(e) = state
        .engine
        .serve(conn, WsTransport::new(sink), Some(inbound))
        .await
    {
        debug!(conn_id = %conn_id, reason = e.label(), "Socket connection ended with error");
    }
}

/// Reads header/body upload pairs until the peer closes or the connection
/// is cancelled.
async fn read_uploads(
    mut stream: SplitStream<WebSocket>,
    writer: ConnectionWriter,
    cancel: CancellationToken,
    ingest: Arc<IngestService>,
    user: UserHash,
) {
    let conn_id = writer.conn_id();
    let mut pending: Option<UploadHeader> = None;

    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            message = stream.next() => message,
        };

        let message = match message {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                debug!(conn_id = %conn_id, error = %e, "Socket read failed");
                break;
            }
            None => break,
        };

        let body = match message {
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Text(text) if pending.is_none() => {
                match serde_json::from_str::<UploadHeader>(text.as_str()) {
                    Ok(header) => pending = Some(header),
                    Err(e) => warn!(conn_id = %conn_id, error = %e, "Invalid upload header"),
                }
                continue;
            }
            Message::Binary(_) if pending.is_none() => {
                warn!(conn_id = %conn_id, "Upload body without a header, ignoring");
                continue;
            }
            Message::Text(text) => Bytes::copy_from_slice(text.as_str().as_bytes()),
            Message::Binary(data) => data,
        };

        let Some(header) = pending.take() else {
            continue;
        };
        match ingest
            .ingest(&user, &header.name, &header.content_type, body)
            .await
        {
            Ok(stored) => {
                let receipt = UploadReceipt::stored(stored.name, stored.location);
                let text = match serde_json::to_string(&receipt) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "Failed to encode receipt");
                        continue;
                    }
                };
                if writer.write(Outbound::Text(text)).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(conn_id = %conn_id, reason = e.label(), error = %e, "Upload failed");
            }
        }
    }
}
