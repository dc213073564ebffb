use owo_colors::OwoColorize;

/// Resolves once SIGINT or SIGTERM is received (Ctrl+C locally, SIGTERM in a
/// container/pod). Callers cancel a `CancellationToken` on return so
/// in-flight reconciles and gRPC calls can finish before the process exits.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt()).expect("install SIGINT handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");

        tokio::select! {
            _ = sigint.recv()  => tracing::warn!("{}", "received SIGINT".red()),
            _ = sigterm.recv() => tracing::warn!("{}", "received SIGTERM".red()),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("install Ctrl+C handler");
    }
}
