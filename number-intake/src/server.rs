use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use health::HealthRegistry;
use tokio::io::AsyncWrite;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::admission::AdmissionGate;
use crate::config::Config;
use crate::dedup::{Deduplicator, Ingest};
use crate::error::IntakeError;
use crate::filter::MembershipFilter;
use crate::listener::accept_loop;
use crate::persist::{persist, Persisted};
use crate::reporter::{run_report_loop, IntervalReport};
use crate::shutdown::ShutdownFlag;
use crate::tally::{Tally, TallySnapshot};

const DEDUPLICATOR_HEARTBEAT: Duration = Duration::from_secs(1);
const DEDUPLICATOR_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Totals at the moment the buffer was handed to the persister.
    pub tally: TallySnapshot,
    pub persisted: Persisted,
    pub last_report: IntervalReport,
    /// False if some connection was still open when the grace period ran out.
    pub drained: bool,
}

pub async fn bind(address: SocketAddr) -> Result<TcpListener, IntakeError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| IntakeError::Bind { address, source })
}

/// The ingestion pipeline: accept loop, connection workers, deduplicator and
/// reporter, tied together by one shutdown flag.
pub struct Intake {
    config: Config,
    tally: Arc<Tally>,
    shutdown: ShutdownFlag,
    liveness: HealthRegistry,
}

impl Intake {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            tally: Arc::new(Tally::new()),
            shutdown: ShutdownFlag::new(),
            liveness: HealthRegistry::new("liveness"),
        }
    }

    pub fn tally(&self) -> Arc<Tally> {
        self.tally.clone()
    }

    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.shutdown.clone()
    }

    pub fn liveness(&self) -> HealthRegistry {
        self.liveness.clone()
    }

    /// Serve `listener` until a client sends the sentinel, then write every
    /// unique number to `sink`.
    ///
    /// After shutdown the accept loop stops, connections still open get up to
    /// the configured grace period to finish, and a flush request is queued
    /// behind every number already sent. Numbers sent after that are not
    /// persisted.
    pub async fn run<W>(self, listener: TcpListener, sink: W) -> Result<RunSummary, IntakeError>
    where
        W: AsyncWrite + Unpin,
    {
        let filter = MembershipFilter::new(
            self.config.filter_capacity,
            self.config.filter_false_positive_rate,
        )?;
        info!(
            capacity = filter.capacity(),
            bits_per_key = filter.bits_per_key(),
            bytes = filter.size_in_bytes(),
            "membership filter ready"
        );

        let (ingest, receiver) = mpsc::channel(self.config.ingest_queue_capacity.max(1));

        let dedup_liveness = self
            .liveness
            .register("deduplicator", DEDUPLICATOR_DEADLINE);
        tokio::spawn(Deduplicator::new(filter, self.tally.clone()).run(
            receiver,
            dedup_liveness,
            DEDUPLICATOR_HEARTBEAT,
        ));

        if let Ok(address) = listener.local_addr() {
            info!(%address, max_clients = self.config.max_clients.get(), "listening");
        }
        let gate = AdmissionGate::new(self.config.max_clients);
        let acceptor = tokio::spawn(accept_loop(
            listener,
            gate.clone(),
            ingest.clone(),
            self.shutdown.clone(),
        ));

        let report_every = self.config.report_interval();
        let reporter_liveness = self.liveness.register("reporter", report_every * 3);
        let last_report = run_report_loop(
            self.tally.clone(),
            report_every,
            self.shutdown.clone(),
            reporter_liveness,
        )
        .await;

        if let Err(error) = acceptor.await {
            warn!(%error, "accept loop ended abnormally");
        }

        let drained = gate.drain(self.config.shutdown_grace()).await;
        if !drained {
            warn!(
                open = gate.in_use(),
                "connections still open after the grace period, their later numbers are dropped"
            );
        }

        let (reply, flushed) = oneshot::channel();
        ingest
            .send(Ingest::Flush(reply))
            .await
            .map_err(|_| IntakeError::DeduplicatorStopped)?;
        drop(ingest);
        let flushed = flushed.await.map_err(|_| IntakeError::DeduplicatorStopped)?;

        let started = Instant::now();
        let persisted = persist(&flushed.buffer, sink).await?;
        metrics::histogram!("intake_flush_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        Ok(RunSummary {
            tally: flushed.tally,
            persisted,
            last_report,
            drained,
        })
    }
}
