//! One cancellable unit of work per connection.
//!
//! A connection is cancelled when the peer goes away, when any write on it
//! fails, or when the engine shuts down. Cancellation stops the relay
//! loop, the inbound task, and the disconnect watcher; only once all of
//! them have finished is the subscription released, from this one place.
//! Releasing does not touch the transport, so it never waits on the
//! writer's (bounded) transport close.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use courier_core::types::{UserHash, VerifiedIdentity};

use crate::error::RelayError;
use crate::metrics::RelayMetrics;
use crate::relay::{BacklogReplayer, ConnectionWriter, FrameTransport, StreamRelay};
use crate::subscription::SubscriptionLease;

/// Inbound half of a bidirectional connection.
///
/// Receives the connection's writer and cancellation token; the returned
/// future should finish when the peer closes or the token fires. Its
/// completion cancels the connection.
pub type InboundTask =
    Box<dyn FnOnce(ConnectionWriter, CancellationToken) -> BoxFuture<'static, ()> + Send>;

/// An authenticated connection whose subscription has been provisioned.
#[derive(Debug)]
pub struct OpenConnection {
    /// Connection id for logs.
    pub conn_id: Uuid,
    /// Who the connection belongs to.
    pub identity: VerifiedIdentity,
    /// Hash of the identity's subject.
    pub user_hash: UserHash,
    pub(crate) lease: SubscriptionLease,
    pub(crate) cancel: CancellationToken,
}

impl OpenConnection {
    /// Name of the connection's subscription.
    pub fn subscription(&self) -> &str {
        self.lease.name()
    }

    /// Topic the subscription reads from.
    pub fn topic(&self) -> &str {
        self.lease.topic()
    }

    /// Token that cancels this connection.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Serves open connections.
#[derive(Debug, Clone)]
pub struct ConnectionLifecycle {
    relay: StreamRelay,
    backlog: Option<BacklogReplayer>,
    writer_buffer: usize,
    metrics: Arc<RelayMetrics>,
}

impl ConnectionLifecycle {
    /// Creates a lifecycle runner.
    pub fn new(
        relay: StreamRelay,
        backlog: Option<BacklogReplayer>,
        writer_buffer: usize,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            relay,
            backlog,
            writer_buffer,
            metrics,
        }
    }

    /// Serves `conn` over `transport` until it is cancelled, then tears
    /// everything down. Returns only after the writer, the inbound task and
    /// the subscription are all gone.
    pub async fn run<T: FrameTransport>(
        &self,
        conn: OpenConnection,
        transport: T,
        inbound: Option<InboundTask>,
    ) -> Result<(), RelayError> {
        let OpenConnection {
            conn_id,
            user_hash,
            lease,
            cancel,
            ..
        } = conn;
        let kind = transport.kind();

        self.metrics.connection_opened();
        info!(
            conn_id = %conn_id,
            user_hash = %user_hash,
            subscription = lease.name(),
            transport = kind,
            "Connection opened"
        );

        let disconnected = transport.disconnected();
        let (writer, writer_task) =
            ConnectionWriter::spawn(conn_id, transport, self.writer_buffer, cancel.clone());

        let watcher = disconnected.map(|peer_gone| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = peer_gone => {
                        debug!(conn_id = %conn_id, "Peer disconnected");
                        cancel.cancel();
                    }
                }
            })
        });

        let inbound_task = inbound.map(|start| {
            let work = start(writer.clone(), cancel.clone());
            let cancel = cancel.clone();
            tokio::spawn(async move {
                work.await;
                cancel.cancel();
            })
        });

        let mut result = Ok(());
        if let Some(backlog) = &self.backlog {
            if let Err(e) = backlog.replay(&user_hash, &writer).await {
                warn!(conn_id = %conn_id, error = %e, kind = e.label(), "Backlog replay failed");
                if matches!(e, RelayError::WriteFailed(_)) {
                    cancel.cancel();
                    result = Err(e);
                }
            }
        }
        if !cancel.is_cancelled() {
            result = self.relay.attach(&lease, &writer, &cancel).await;
        }

        cancel.cancel();
        drop(writer);
        join("inbound", conn_id, inbound_task).await;
        join("watcher", conn_id, watcher).await;
        lease.release().await;
        join("writer", conn_id, Some(writer_task)).await;

        self.metrics.connection_closed();
        match &result {
            Ok(()) => info!(conn_id = %conn_id, user_hash = %user_hash, "Connection closed"),
            Err(e) => info!(
                conn_id = %conn_id,
                user_hash = %user_hash,
                error = %e,
                kind = e.label(),
                "Connection closed with error"
            ),
        }
        result
    }
}

async fn join(task: &str, conn_id: Uuid, handle: Option<JoinHandle<()>>) {
    if let Some(handle) = handle {
        if let Err(e) = handle.await {
            warn!(conn_id = %conn_id, task, error = %e, "Connection task ended abnormally");
        }
    }
}
