use std::net::SocketAddr;

use axum::{routing::get, Router};
use health::HealthRegistry;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Bind `address` and serve `router` on it until the task is dropped.
pub async fn serve(router: Router, address: SocketAddr) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(address).await?;

    axum::serve(listener, router).await?;

    Ok(())
}

/// Router exposing the Prometheus scrape endpoint and the liveness check.
///
/// Installs the global metrics recorder, so call it at most once per process.
pub fn setup_metrics_router(liveness: HealthRegistry) -> Result<Router, BuildError> {
    let recorder_handle = setup_metrics_recorder()?;

    let router = Router::new()
        .route(
            "/metrics",
            get(move || std::future::ready(recorder_handle.render())),
        )
        .route(
            "/_liveness",
            get(move || std::future::ready(liveness.get_status())),
        );
    Ok(router)
}

pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    const EXPONENTIAL_SECONDS: &[f64] = &[
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    PrometheusBuilder::new()
        .set_buckets(EXPONENTIAL_SECONDS)?
        .install_recorder()
}
