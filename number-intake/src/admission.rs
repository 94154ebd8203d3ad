use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Capacity unit for one client connection. Dropping it returns the capacity,
/// so every exit path of a connection worker releases exactly once.
#[derive(Debug)]
pub struct AdmissionToken {
    permit: Option<OwnedSemaphorePermit>,
    gate: AdmissionGate,
}

impl Drop for AdmissionToken {
    fn drop(&mut self) {
        drop(self.permit.take());
        self.gate.report_saturation();
    }
}

/// Counting semaphore bounding the number of concurrently served connections.
#[derive(Clone, Debug)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    max_clients: usize,
}

impl AdmissionGate {
    pub fn new(max_clients: NonZeroUsize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_clients.get())),
            max_clients: max_clients.get(),
        }
    }

    /// Wait until a slot is free. The gate is never closed, so this only suspends.
    pub async fn acquire(&self) -> AdmissionToken {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("admission semaphore is never closed");
        self.report_saturation();
        AdmissionToken {
            permit: Some(permit),
            gate: self.clone(),
        }
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }

    pub fn in_use(&self) -> usize {
        self.max_clients - self.semaphore.available_permits()
    }

    /// Wait up to `grace` for every outstanding token to come back.
    ///
    /// Returns false if some connection still held a token when the grace period
    /// ran out. Capacity taken here is handed back before returning.
    pub async fn drain(&self, grace: Duration) -> bool {
        let Ok(all) = u32::try_from(self.max_clients) else {
            return false;
        };
        match tokio::time::timeout(grace, self.semaphore.acquire_many(all)).await {
            Ok(Ok(_permits)) => true,
            _ => false,
        }
    }

    /// Share of client slots in use, 0 to 100.
    pub fn saturation_percent(&self) -> f64 {
        self.in_use() as f64 * 100.0 / self.max_clients as f64
    }

    fn report_saturation(&self) {
        metrics::gauge!("intake_admission_saturation_percent").set(self.saturation_percent());
    }
}
