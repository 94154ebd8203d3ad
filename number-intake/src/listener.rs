use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::admission::AdmissionGate;
use crate::connection::handle_connection;
use crate::dedup::Ingest;
use crate::shutdown::ShutdownFlag;

/// Pause after a failed accept, so a persistent error such as running out of
/// file descriptors does not spin the loop.
pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Accept connections until shutdown, one worker task per connection.
///
/// A token is taken from `gate` before every accept, so at most
/// `gate.max_clients()` workers run at any time. A failed accept hands its
/// token straight back and waits `ACCEPT_ERROR_BACKOFF`. The listener is
/// dropped on return, so later connection attempts are refused by the OS.
pub async fn accept_loop(
    listener: TcpListener,
    gate: AdmissionGate,
    ingest: mpsc::Sender<Ingest>,
    shutdown: ShutdownFlag,
) {
    loop {
        let token = tokio::select! {
            biased;
            _ = shutdown.triggered() => break,
            token = gate.acquire() => token,
        };

        let accepted = tokio::select! {
            biased;
            _ = shutdown.triggered() => break,
            accepted = listener.accept() => accepted,
        };
        let (stream, peer) = match accepted {
            Ok(accepted) => accepted,
            Err(error) => {
                metrics::counter!("intake_accept_errors_total").increment(1);
                warn!(%error, "failed to accept connection");
                drop(token);
                if back_off(&shutdown).await {
                    continue;
                }
                break;
            }
        };

        metrics::counter!("intake_connections_accepted_total").increment(1);
        debug!(%peer, in_use = gate.in_use(), "accepted connection");

        let ingest = ingest.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let outcome = handle_connection(stream, ingest, shutdown).await;
            drop(token);
            outcome.log(peer);
        });
    }

    info!("stopped accepting connections");
}

/// Wait out `ACCEPT_ERROR_BACKOFF`. Returns false if shutdown began meanwhile.
async fn back_off(shutdown: &ShutdownFlag) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.triggered() => false,
        _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => true,
    }
}
