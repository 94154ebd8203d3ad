use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::info;

use crate::buffer::AccumulationBuffer;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("failed to create output sink {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write output sink: {0}")]
    Write(#[from] std::io::Error),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Persisted {
    pub numbers: usize,
    pub bytes: u64,
}

/// Create the output sink, truncating anything a previous run left behind.
pub async fn create_sink(path: &Path) -> Result<File, PersistError> {
    File::create(path)
        .await
        .map_err(|source| PersistError::Create {
            path: path.to_owned(),
            source,
        })
}

/// Write every buffered number, one zero-padded number per line in buffer
/// order, and flush the sink before returning.
pub async fn persist<W>(buffer: &AccumulationBuffer, sink: W) -> Result<Persisted, PersistError>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::new(sink);
    let mut persisted = Persisted::default();
    let mut line = String::with_capacity(10);

    for number in buffer.iter() {
        line.clear();
        line.push_str(&number.to_string());
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;

        persisted.numbers += 1;
        persisted.bytes += line.len() as u64;
    }
    writer.flush().await?;

    metrics::counter!("intake_persisted_numbers_total").increment(persisted.numbers as u64);
    info!(
        numbers = persisted.numbers,
        bytes = persisted.bytes,
        "Finished storing numbers"
    );
    Ok(persisted)
}
