//! The write side of a connection.

use std::convert::Infallible;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use futures::future::BoxFuture;
use tokio::sync::mpsc;

use courier_core::error::AppError;
use courier_core::result::AppResult;

use super::frame::{Outbound, frame_event};

/// A connection that frames and writes outbound messages.
///
/// Only the connection's writer task ever holds the transport, so
/// implementations need no internal locking.
#[async_trait]
pub trait FrameTransport: Send + 'static {
    /// Transport name for logs.
    fn kind(&self) -> &'static str;

    /// Frame `frame` and write it, flushed, to the peer.
    async fn write(&mut self, frame: Outbound) -> AppResult<()>;

    /// A future that resolves when the peer goes away, for transports
    /// that have no inbound half to notice it.
    fn disconnected(&self) -> Option<BoxFuture<'static, ()>> {
        None
    }

    /// Close the connection after the last write.
    async fn close(&mut self) {}
}

/// Body stream of a push-stream response.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Bytes, Infallible>> + Send>>;

/// Push-stream transport feeding an HTTP response body.
///
/// Each write becomes one body chunk. The channel holds a single chunk so
/// a write completes only once the previous frame was taken by the HTTP
/// layer.
#[derive(Debug, Clone)]
pub struct EventStreamTransport {
    tx: mpsc::Sender<Bytes>,
}

impl EventStreamTransport {
    /// Creates the transport and the body stream it writes into.
    pub fn channel() -> (Self, EventStream) {
        let (tx, rx) = mpsc::channel::<Bytes>(1);
        let body = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (Ok(chunk), rx))
        });
        (Self { tx }, Box::pin(body))
    }
}

#[async_trait]
impl FrameTransport for EventStreamTransport {
    fn kind(&self) -> &'static str {
        "event-stream"
    }

    async fn write(&mut self, frame: Outbound) -> AppResult<()> {
        self.tx
            .send(frame_event(frame.as_bytes()))
            .await
            .map_err(|_| AppError::service_unavailable("Event stream closed by peer"))
    }

    fn disconnected(&self) -> Option<BoxFuture<'static, ()>> {
        let tx = self.tx.clone();
        Some(Box::pin(async move { tx.closed().await }))
    }
}
