use std::sync::Arc;
use std::time::Duration;

use health::HealthHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

use crate::shutdown::ShutdownFlag;
use crate::tally::{Tally, TallySnapshot};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IntervalReport {
    pub unique: u64,
    pub duplicates: u64,
    pub unique_total: u64,
}

/// Turns successive tally snapshots into per-interval deltas.
#[derive(Debug, Default)]
pub struct Reporter {
    previous: TallySnapshot,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, current: TallySnapshot) -> IntervalReport {
        let report = IntervalReport {
            unique: current.unique - self.previous.unique,
            duplicates: current.duplicate - self.previous.duplicate,
            unique_total: current.unique,
        };
        self.previous = current;
        report
    }
}

fn emit(report: &IntervalReport, last: bool) {
    info!(
        unique = report.unique,
        duplicates = report.duplicates,
        unique_total = report.unique_total,
        last,
        "Received {} unique numbers, {} duplicates. Unique total: {}",
        report.unique,
        report.duplicates,
        report.unique_total
    );
}

/// Log a report every `every` until shutdown, then log one last report for
/// the partial interval and return it.
pub async fn run_report_loop(
    tally: Arc<Tally>,
    every: Duration,
    shutdown: ShutdownFlag,
    liveness: HealthHandle,
) -> IntervalReport {
    let mut reporter = Reporter::new();
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    liveness.report_healthy();

    while !shutdown.is_triggered() {
        tokio::select! {
            biased;
            _ = shutdown.triggered() => break,
            _ = ticker.tick() => {
                let report = reporter.observe(tally.snapshot());
                emit(&report, false);
                liveness.report_healthy();
            }
        }
    }

    let last = reporter.observe(tally.snapshot());
    emit(&last, true);
    last
}
