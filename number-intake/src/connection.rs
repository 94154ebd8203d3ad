use std::net::SocketAddr;

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

use crate::dedup::Ingest;
use crate::record::{self, Record, RejectReason};
use crate::shutdown::ShutdownFlag;

/// Longest line we are willing to buffer. Valid lines are at most nine bytes.
pub const MAX_LINE_LENGTH: usize = 64;

/// Best-effort notice for lines arriving once shutdown has begun.
pub const TERMINATED_NOTICE: &[u8] = b"Process terminated";

/// Why a connection worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// The peer closed its side of the stream.
    Finished,
    Rejected(RejectReason),
    LineTooLong,
    /// This connection sent the sentinel.
    ShutdownRequested,
    /// A line arrived after shutdown began.
    RefusedAfterShutdown,
    /// The deduplicator is gone, nothing can be forwarded anymore.
    IngestClosed,
    ReadFailed,
}

impl ConnectionOutcome {
    pub fn log(&self, peer: SocketAddr) {
        match self {
            ConnectionOutcome::Finished => debug!(%peer, "client closed the connection"),
            ConnectionOutcome::Rejected(reason) => {
                metrics::counter!("intake_connections_rejected_total", "reason" => reason.as_str())
                    .increment(1);
                debug!(%peer, reason = reason.as_str(), "invalid input, closing connection");
            }
            ConnectionOutcome::LineTooLong => {
                metrics::counter!("intake_connections_rejected_total", "reason" => "line_too_long")
                    .increment(1);
                debug!(%peer, "line exceeded {} bytes, closing connection", MAX_LINE_LENGTH);
            }
            ConnectionOutcome::ShutdownRequested => {
                info!(%peer, "received terminate, shutting down")
            }
            ConnectionOutcome::RefusedAfterShutdown => {
                debug!(%peer, "refused input after shutdown")
            }
            ConnectionOutcome::IngestClosed => {
                warn!(%peer, "ingestion channel closed, dropping connection")
            }
            ConnectionOutcome::ReadFailed => debug!(%peer, "read failed, closing connection"),
        }
    }
}

/// Serve one client: read lines until the peer closes or a terminal condition
/// hits, forwarding every valid number to the deduplicator.
///
/// The send into `ingest` waits for room in the channel, which is how a slow
/// deduplicator throttles fast clients. The stream is shut down before
/// returning, whatever the outcome.
pub async fn handle_connection<S>(
    stream: S,
    ingest: mpsc::Sender<Ingest>,
    shutdown: ShutdownFlag,
) -> ConnectionOutcome
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut lines = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    let outcome = loop {
        let line = match lines.next().await {
            None => break ConnectionOutcome::Finished,
            Some(Ok(line)) => line,
            Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                break ConnectionOutcome::LineTooLong
            }
            Some(Err(LinesCodecError::Io(error))) => {
                debug!(%error, "failed to read from client");
                break ConnectionOutcome::ReadFailed;
            }
        };

        if shutdown.is_triggered() {
            if let Err(error) = lines.get_mut().write_all(TERMINATED_NOTICE).await {
                debug!(%error, "could not deliver the termination notice");
            }
            break ConnectionOutcome::RefusedAfterShutdown;
        }

        match record::validate(&line) {
            Err(reason) => break ConnectionOutcome::Rejected(reason),
            Ok(Record::Terminate) => {
                shutdown.trigger();
                break ConnectionOutcome::ShutdownRequested;
            }
            Ok(Record::Number(number)) => {
                if ingest.send(Ingest::Record(number)).await.is_err() {
                    break ConnectionOutcome::IngestClosed;
                }
            }
        }
    };

    let mut stream = lines.into_inner();
    if let Err(error) = stream.shutdown().await {
        debug!(%error, "failed to shut down client stream");
    }
    outcome
}
