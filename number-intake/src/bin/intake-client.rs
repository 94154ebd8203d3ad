//! Flood an intake server with random numbers until it hangs up.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use envconfig::Envconfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{info, warn};

use number_intake::client::{random_package, ClientConfig};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ClientConfig::init_from_env().expect("Invalid configuration:");
    let mut stream = TcpStream::connect(config.server_address).await?;
    info!(address = %config.server_address, "connected");

    let sent = Arc::new(AtomicU64::new(0));
    let progress = {
        let sent = sent.clone();
        let every = config.progress_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                info!("Total packages sent: {}", sent.load(Ordering::Relaxed));
            }
        })
    };

    let mut rng = rand::thread_rng();
    loop {
        if config
            .max_packages
            .is_some_and(|max| sent.load(Ordering::Relaxed) >= max)
        {
            break;
        }
        let package = random_package(&mut rng, config.numbers_per_package);
        if let Err(error) = stream.write_all(package.as_bytes()).await {
            warn!(%error, "write to server failed");
            break;
        }
        sent.fetch_add(1, Ordering::Relaxed);
    }
    progress.abort();

    if let Err(error) = stream.shutdown().await {
        warn!(%error, "failed to close the write half");
    }
    let mut reply = Vec::new();
    match stream.read_to_end(&mut reply).await {
        Ok(_) if !reply.is_empty() => {
            info!("reply from server: {}", String::from_utf8_lossy(&reply))
        }
        Ok(_) => {}
        Err(error) => warn!(%error, "failed to read reply from server"),
    }
    info!("Total packages sent: {}", sent.load(Ordering::Relaxed));

    Ok(())
}
