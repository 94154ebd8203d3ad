use std::sync::Arc;
use std::time::Duration;

use health::HealthHandle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::buffer::AccumulationBuffer;
use crate::filter::MembershipFilter;
use crate::record::Number;
use crate::tally::{Tally, TallySnapshot};

/// Messages on the ingestion channel. Connection workers send records; the
/// pipeline sends a single flush request at shutdown, which is answered in
/// channel order, after every record queued before it.
#[derive(Debug)]
pub enum Ingest {
    Record(Number),
    Flush(oneshot::Sender<Flushed>),
}

/// State handed to the persister.
#[derive(Debug)]
pub struct Flushed {
    pub buffer: AccumulationBuffer,
    pub tally: TallySnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Unique,
    Duplicate,
}

/// Sole consumer of the ingestion channel and sole owner of the membership
/// filter and the accumulation buffer.
pub struct Deduplicator {
    filter: MembershipFilter,
    tally: Arc<Tally>,
    buffer: AccumulationBuffer,
}

impl Deduplicator {
    pub fn new(filter: MembershipFilter, tally: Arc<Tally>) -> Self {
        Self {
            filter,
            tally,
            buffer: AccumulationBuffer::new(),
        }
    }

    pub fn process(&mut self, number: Number) -> Verdict {
        if self.filter.contains(number) {
            self.tally.record_duplicate();
            return Verdict::Duplicate;
        }

        self.filter.insert(number);
        self.tally.record_unique();
        self.buffer.push(number);
        Verdict::Unique
    }

    pub fn buffer(&self) -> &AccumulationBuffer {
        &self.buffer
    }

    /// Hand the accumulated numbers over. Numbers processed afterwards start a
    /// new, unpersisted buffer.
    pub fn flush(&mut self) -> Flushed {
        Flushed {
            buffer: std::mem::take(&mut self.buffer),
            tally: self.tally.snapshot(),
        }
    }

    /// Drain the channel until every sender is gone. Heartbeats go to
    /// `liveness` every `heartbeat` while idle or busy.
    pub async fn run(
        mut self,
        mut receiver: mpsc::Receiver<Ingest>,
        liveness: HealthHandle,
        heartbeat: Duration,
    ) {
        let mut ticker = tokio::time::interval(heartbeat);

        loop {
            tokio::select! {
                message = receiver.recv() => match message {
                    Some(Ingest::Record(number)) => {
                        let verdict = self.process(number);
                        debug!(%number, ?verdict, "processed number");
                    }
                    Some(Ingest::Flush(reply)) => {
                        let flushed = self.flush();
                        info!(
                            numbers = flushed.buffer.len(),
                            unique_total = flushed.tally.unique,
                            "handing accumulated numbers to the persister"
                        );
                        if reply.send(flushed).is_err() {
                            warn!("flush requester went away before receiving the buffer");
                        }
                    }
                    None => {
                        debug!("ingestion channel closed, deduplicator stopping");
                        break;
                    }
                },
                _ = ticker.tick() => {
                    liveness.report_healthy();
                    metrics::gauge!("intake_membership_filter_fill_ratio")
                        .set(self.filter.fill_ratio());
                }
            }
        }
    }
}
