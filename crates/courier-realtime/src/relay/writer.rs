//! The single writer task of a connection.
//!
//! Every producer on a connection (the bus relay, backlog replay, socket
//! upload receipts) sends frames through a bounded channel to one task that
//! owns the transport. Writes are therefore serialized without a lock, and
//! each producer learns the outcome of its own write.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use courier_core::result::AppResult;

use super::frame::Outbound;
use super::transport::FrameTransport;
use crate::error::RelayError;

/// Upper bound on closing the transport once the writer stops. A peer that
/// stopped reading can otherwise hold the close flush forever.
pub(crate) const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// A frame plus the channel its write result is reported on.
#[derive(Debug)]
struct WriteCommand {
    frame: Outbound,
    done: oneshot::Sender<AppResult<()>>,
}

/// Cloneable handle for writing to one connection.
#[derive(Debug, Clone)]
pub struct ConnectionWriter {
    conn_id: Uuid,
    tx: mpsc::Sender<WriteCommand>,
}

impl ConnectionWriter {
    /// Spawns the writer task for `transport`.
    ///
    /// The task stops when `cancel` fires or when a write fails; a failed
    /// write also cancels `cancel` so the whole connection tears down.
    pub fn spawn<T: FrameTransport>(
        conn_id: Uuid,
        transport: T,
        buffer: usize,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let task = tokio::spawn(run_writer(conn_id, transport, rx, cancel));
        (Self { conn_id, tx }, task)
    }

    /// Writes `frame` and waits until it has been written and flushed.
    pub async fn write(&self, frame: Outbound) -> Result<(), RelayError> {
        let (done, result) = oneshot::channel();
        self.tx
            .send(WriteCommand { frame, done })
            .await
            .map_err(|_| RelayError::WriteFailed("connection writer stopped".to_string()))?;

        match result.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(RelayError::WriteFailed(e.to_string())),
            Err(_) => Err(RelayError::WriteFailed(
                "connection closed before write".to_string(),
            )),
        }
    }

    /// Connection this writer belongs to.
    pub fn conn_id(&self) -> Uuid {
        self.conn_id
    }
}

async fn run_writer<T: FrameTransport>(
    conn_id: Uuid,
    mut transport: T,
    mut rx: mpsc::Receiver<WriteCommand>,
    cancel: CancellationToken,
) {
    let kind = transport.kind();
    loop {
        let command = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            command = rx.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = transport.write(command.frame) => result,
        };

        let failed = result.is_err();
        if let Err(e) = &result {
            warn!(conn_id = %conn_id, transport = kind, error = %e, "Connection write failed");
            cancel.cancel();
        }
        let _ = command.done.send(result);
        if failed {
            break;
        }
    }

    if tokio::time::timeout(CLOSE_TIMEOUT, transport.close())
        .await
        .is_err()
    {
        warn!(conn_id = %conn_id, transport = kind, "Transport close timed out");
    }
    debug!(conn_id = %conn_id, transport = kind, "Connection writer stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use bytes::Bytes;
    use courier_core::error::AppError;

    use super::*;

    /// Records frames; fails every write after `fail_after` successes.
    #[derive(Debug, Clone, Default)]
    struct RecordingTransport {
        written: Arc<Mutex<Vec<Outbound>>>,
        fail_after: Option<usize>,
    }

    #[async_trait]
    impl FrameTransport for RecordingTransport {
        fn kind(&self) -> &'static str {
            "recording"
        }

        async fn write(&mut self, frame: Outbound) -> AppResult<()> {
            let mut written = self.written.lock().unwrap();
            if self.fail_after.is_some_and(|n| written.len() >= n) {
                return Err(AppError::internal("broken pipe"));
            }
            written.push(frame);
            Ok(())
        }
    }

    /// Accepts writes but never finishes closing.
    #[derive(Debug)]
    struct StuckCloseTransport;

    #[async_trait]
    impl FrameTransport for StuckCloseTransport {
        fn kind(&self) -> &'static str {
            "stuck-close"
        }

        async fn write(&mut self, _frame: Outbound) -> AppResult<()> {
            Ok(())
        }

        async fn close(&mut self) {
            std::future::pending::<()>().await;
        }
    }

    #[tokio::test]
    async fn test_concurrent_producers_are_serialized() {
        let transport = RecordingTransport::default();
        let written = transport.written.clone();
        let cancel = CancellationToken::new();
        let (writer, task) = ConnectionWriter::spawn(Uuid::new_v4(), transport, 4, cancel.clone());

        let mut handles = Vec::new();
        for producer in 0..4 {
            let writer = writer.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..25 {
                    writer
                        .write(Outbound::Text(format!("{producer}:{i}")))
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let frames = written.lock().unwrap().clone();
        assert_eq!(frames.len(), 100);
        // Per-producer order is preserved.
        for producer in 0..4 {
            let seq: Vec<String> = frames
                .iter()
                .filter_map(|f| match f {
                    Outbound::Text(t) if t.starts_with(&format!("{producer}:")) => Some(t.clone()),
                    _ => None,
                })
                .collect();
            let expected: Vec<String> = (0..25).map(|i| format!("{producer}:{i}")).collect();
            assert_eq!(seq, expected);
        }

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_write_failure_cancels_connection() {
        let transport = RecordingTransport {
            fail_after: Some(1),
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        let (writer, task) = ConnectionWriter::spawn(Uuid::new_v4(), transport, 4, cancel.clone());

        writer.write(Outbound::Payload(Bytes::from("a"))).await.unwrap();
        let err = writer
            .write(Outbound::Payload(Bytes::from("b")))
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::WriteFailed(_)));
        assert!(cancel.is_cancelled());
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();

        let err = writer
            .write(Outbound::Payload(Bytes::from("c")))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::WriteFailed(_)));
    }

    #[tokio::test]
    async fn test_cancel_stops_writer() {
        let cancel = CancellationToken::new();
        let (writer, task) = ConnectionWriter::spawn(
            Uuid::new_v4(),
            RecordingTransport::default(),
            4,
            cancel.clone(),
        );

        cancel.cancel();
        task.await.unwrap();
        assert!(writer.write(Outbound::Text("late".into())).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_close_does_not_hold_the_writer() {
        let cancel = CancellationToken::new();
        let (writer, task) =
            ConnectionWriter::spawn(Uuid::new_v4(), StuckCloseTransport, 4, cancel.clone());
        writer.write(Outbound::Text("last".into())).await.unwrap();

        cancel.cancel();
        tokio::time::timeout(CLOSE_TIMEOUT * 2, task)
            .await
            .expect("writer stops after the close timeout")
            .unwrap();
    }
}
