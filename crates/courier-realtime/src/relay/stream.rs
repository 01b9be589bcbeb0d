//! The bus receive loop of a connection.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use courier_core::error::AppError;
use courier_core::result::AppResult;
use courier_core::traits::bus::MessageBus;

use super::frame::Outbound;
use super::writer::ConnectionWriter;
use crate::error::RelayError;
use crate::metrics::RelayMetrics;
use crate::subscription::SubscriptionLease;

/// Relays messages from a subscription to a connection writer.
#[derive(Debug, Clone)]
pub struct StreamRelay {
    bus: Arc<dyn MessageBus>,
    /// Upper bound on each ack and nack.
    op_timeout: Duration,
    metrics: Arc<RelayMetrics>,
}

impl StreamRelay {
    /// Creates a relay over `bus`.
    pub fn new(bus: Arc<dyn MessageBus>, op_timeout: Duration, metrics: Arc<RelayMetrics>) -> Self {
        Self {
            bus,
            op_timeout,
            metrics,
        }
    }

    async fn bounded(
        &self,
        operation: &str,
        fut: impl Future<Output = AppResult<()>>,
    ) -> AppResult<()> {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| {
                AppError::timeout(format!(
                    "Bus {operation} timed out after {}s",
                    self.op_timeout.as_secs()
                ))
            })?
    }

    /// Receives from `subscription` and writes each message through
    /// `writer`, in bus order, until `cancel` fires or the subscription is
    /// deleted.
    ///
    /// A message is acknowledged only after its write succeeded. On a
    /// failed write the message is returned to the bus, the connection is
    /// cancelled, and `WriteFailed` is returned without draining further
    /// messages. Acks and nacks are bounded by the bus operation timeout,
    /// and an ack still pending when the connection is cancelled is
    /// abandoned; the bus redelivers that message.
    pub async fn attach(
        &self,
        subscription: &SubscriptionLease,
        writer: &ConnectionWriter,
        cancel: &CancellationToken,
    ) -> Result<(), RelayError> {
        let name = subscription.name();
        loop {
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(conn_id = %writer.conn_id(), subscription = name, "Relay cancelled");
                    return Ok(());
                }
                received = self.bus.receive(name) => received,
            };

            let message = match received {
                Ok(Some(message)) => message,
                Ok(None) => {
                    debug!(subscription = name, "Subscription closed");
                    return Ok(());
                }
                Err(e) => return Err(RelayError::from(e)),
            };

            match writer.write(Outbound::Payload(message.data.clone())).await {
                Ok(()) => {
                    RelayMetrics::incr(&self.metrics.messages_relayed);
                    let acked = tokio::select! {
                        biased;
                        acked = self.bounded("ack", self.bus.ack(name, &message.ack_id)) => acked,
                        _ = cancel.cancelled() => {
                            debug!(subscription = name, message_id = %message.id, "Ack abandoned, relay cancelled");
                            return Ok(());
                        }
                    };
                    if let Err(e) = acked {
                        warn!(subscription = name, message_id = %message.id, error = %e, "Failed to ack message");
                    }
                }
                Err(e) => {
                    RelayMetrics::incr(&self.metrics.write_failures);
                    let nacked = self.bounded("nack", self.bus.nack(name, &message.ack_id)).await;
                    if let Err(nack_err) = nacked {
                        warn!(subscription = name, message_id = %message.id, error = %nack_err, "Failed to nack message");
                    }
                    cancel.cancel();
                    return Err(e);
                }
            }
        }
    }
}
