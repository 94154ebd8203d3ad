//! Accept newline delimited numbers over TCP, count unique and duplicate
//! values, and write the unique ones to a file once a client says `terminate`.
use envconfig::Envconfig;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use number_intake::config::Config;
use number_intake::error::IntakeError;
use number_intake::persist::create_sink;
use number_intake::prometheus::{serve, setup_metrics_router};
use number_intake::server::{bind, Intake};

async fn run(config: Config) -> Result<(), IntakeError> {
    let sink = create_sink(&config.output_path).await?;
    let listener = bind(config.address).await?;

    let intake = Intake::new(config.clone());

    if let Some(address) = config.metrics_address {
        match setup_metrics_router(intake.liveness()) {
            Ok(router) => {
                tokio::spawn(async move {
                    if let Err(error) = serve(router, address).await {
                        error!(%error, "failed to serve metrics");
                    }
                });
            }
            Err(error) => error!(%error, "failed to install metrics recorder"),
        }
    }

    let summary = intake.run(listener, sink).await?;
    info!(
        unique = summary.tally.unique,
        duplicates = summary.tally.duplicate,
        persisted = summary.persisted.numbers,
        path = %config.output_path.display(),
        "shutdown complete"
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::init_from_env().expect("Invalid configuration:");

    if let Err(error) = run(config).await {
        error!("{}", error);
        std::process::exit(1);
    }
}
