use std::net::SocketAddr;
use std::sync::OnceLock;

use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use owo_colors::OwoColorize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn install_recorder_once() -> &'static PrometheusHandle {
    PROM_HANDLE.get_or_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .expect("install global metrics recorder")
    })
}

/// Serves `/metrics` (Prometheus exposition) and `/healthz` on `addr` until
/// `cancel` fires. Grounded on the teacher's
/// `common::metrics::run_metrics_server`, trimmed of the inbound-request
/// instrumentation layer since neither daemon here is primarily an HTTP
/// server (the counters of interest are outbound-call metrics, recorded by
/// `stackit-client`).
pub async fn serve_metrics(addr: SocketAddr, cancel: CancellationToken) -> std::io::Result<()> {
    let handle = install_recorder_once().clone();
    let metrics_route = get(move || {
        let handle = handle.clone();
        async move { handle.render() }
    });
    let app = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/metrics", metrics_route);

    let listener = TcpListener::bind(addr).await.inspect_err(|e| {
        tracing::error!(%addr, error = %e, "{}", "failed to bind metrics server".red());
    })?;
    tracing::info!(%addr, "{}", "starting metrics server".green());
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}
