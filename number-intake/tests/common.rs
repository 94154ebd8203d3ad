#![allow(dead_code)]

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use number_intake::config::{Config, EnvMsDuration, NonZeroMsDuration};
use number_intake::error::IntakeError;
use number_intake::persist::create_sink;
use number_intake::server::{bind, Intake, RunSummary};
use number_intake::shutdown::ShutdownFlag;
use number_intake::tally::{Tally, TallySnapshot};

pub static DEFAULT_CONFIG: Lazy<Config> = Lazy::new(|| Config {
    address: SocketAddr::from_str("127.0.0.1:0").unwrap(),
    output_path: PathBuf::from("numbers.log"),
    max_clients: NonZeroUsize::new(5).unwrap(),
    report_interval_ms: NonZeroMsDuration::new(Duration::from_millis(100)).unwrap(),
    filter_capacity: 10000,
    filter_false_positive_rate: 0.01,
    ingest_queue_capacity: 16,
    shutdown_grace_ms: EnvMsDuration(Duration::from_secs(2)),
    metrics_address: None,
});

static TRACING_INIT: Once = Once::new();
pub fn setup_tracing() {
    TRACING_INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_writer(tracing_subscriber::fmt::TestWriter::new())
            .init()
    });
}

pub async fn assert_or_retry<F>(check: F)
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    while !check() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(check())
}

pub struct ServerHandle {
    pub addr: SocketAddr,
    tally: Arc<Tally>,
    shutdown: ShutdownFlag,
    task: JoinHandle<Result<RunSummary, IntakeError>>,
    output: PathBuf,
    _dir: TempDir,
}

impl ServerHandle {
    pub async fn for_config(config: Config) -> Self {
        setup_tracing();

        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let output = dir.path().join("numbers.log");
        let sink = create_sink(&output).await.expect("failed to create sink");

        let listener = bind(config.address).await.expect("failed to bind");
        let addr = listener.local_addr().expect("no local address");

        let intake = Intake::new(config);
        let tally = intake.tally();
        let shutdown = intake.shutdown_flag();
        let task = tokio::spawn(intake.run(listener, sink));

        Self {
            addr,
            tally,
            shutdown,
            task,
            output,
            _dir: dir,
        }
    }

    pub async fn start() -> Self {
        Self::for_config(DEFAULT_CONFIG.clone()).await
    }

    pub async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr)
            .await
            .expect("failed to connect")
    }

    /// Open a connection and write `payload`, keeping the connection open.
    pub async fn send(&self, payload: &str) -> TcpStream {
        let mut stream = self.connect().await;
        stream
            .write_all(payload.as_bytes())
            .await
            .expect("failed to write");
        stream
    }

    /// Write `payload` on a fresh connection, close our side and wait for the
    /// server to close its side. Returns whatever the server sent back.
    pub async fn send_and_close(&self, payload: &str) -> String {
        let mut stream = self.send(payload).await;
        stream.shutdown().await.expect("failed to shut down");
        read_reply(&mut stream).await
    }

    pub fn snapshot(&self) -> TallySnapshot {
        self.tally.snapshot()
    }

    pub async fn wait_for_unique(&self, unique: u64) {
        assert_or_retry(|| self.snapshot().unique == unique).await
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Send the sentinel and wait for the run to finish. Returns the summary and
    /// the output file contents.
    pub async fn terminate(self) -> (RunSummary, String) {
        let mut stream = self.send("terminate\n").await;
        read_reply(&mut stream).await;
        self.finish().await
    }

    pub async fn finish(self) -> (RunSummary, String) {
        let summary = tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("server did not shut down")
            .expect("server task panicked")
            .expect("server run failed");
        let output = std::fs::read_to_string(&self.output).expect("failed to read output");
        (summary, output)
    }
}

pub async fn read_reply(stream: &mut TcpStream) -> String {
    let mut reply = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut reply))
        .await
        .expect("server kept the connection open")
        .expect("failed to read reply");
    String::from_utf8(reply).expect("reply is not utf-8")
}
