use std::net::SocketAddr;

use thiserror::Error;

use crate::filter::FilterError;
use crate::persist::PersistError;

/// Errors that end the whole process.
#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("failed to bind listener on {address}: {source}")]
    Bind {
        address: SocketAddr,
        source: std::io::Error,
    },
    #[error("invalid membership filter configuration: {0}")]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("deduplicator stopped before the flush was served")]
    DeduplicatorStopped,
}
