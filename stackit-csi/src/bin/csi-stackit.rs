use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::net::UnixListener;
use tokio_stream::wrappers::UnixListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;

use stackit_client::HttpIaasClient;
use stackit_common::shutdown::shutdown_signal;
use stackit_csi::args::Cli;
use stackit_csi::controller::ControllerService;
use stackit_csi::identity::IdentityService;
use stackit_csi::node::{ConfigDriveProvider, InstanceMetadataServiceProvider, MetadataProvider, NodeService, OsMount};
use stackit_csi::proto::controller_server::ControllerServer;
use stackit_csi::proto::identity_server::IdentityServer;
use stackit_csi::proto::node_server::NodeServer;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Cli::parse();

    let socket_path = args
        .endpoint
        .strip_prefix("unix://")
        .ok_or_else(|| anyhow::anyhow!("CSI_ENDPOINT must be a unix:// socket path"))?;
    let _ = std::fs::remove_file(socket_path);
    if let Some(parent) = std::path::Path::new(socket_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let listener = UnixListener::bind(socket_path)?;
    tracing::info!(%socket_path, "csi plugin listening");

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    let metrics_cancel = cancel.clone();
    let metrics_addr = args.metrics_addr;
    tokio::spawn(async move {
        if let Err(e) = stackit_common::metrics::serve_metrics(metrics_addr, metrics_cancel).await {
            tracing::error!(error = %e, "metrics server exited");
        }
    });

    let mut server = Server::builder().add_service(IdentityServer::new(IdentityService::default()));

    if args.controller {
        let http = reqwest::Client::new();
        let iaas_client: Arc<dyn stackit_client::IaasClient> =
            Arc::new(HttpIaasClient::new(http, args.iaas_api.clone()));
        let controller = ControllerService::new(iaas_client, args.project_id.clone());
        server = server.add_service(ControllerServer::new(controller));
    }

    if args.node {
        let node_id = args.node_id.clone().ok_or_else(|| anyhow::anyhow!("--node-id is required with --node"))?;
        let region = args.region.clone().unwrap_or_default();
        let zone = args.zone.clone().unwrap_or_default();
        let metadata: Box<dyn MetadataProvider> = match &args.metadata_endpoint {
            Some(endpoint) => Box::new(InstanceMetadataServiceProvider {
                endpoint: endpoint.clone(),
                region,
                zone,
                client: reqwest::Client::new(),
            }),
            None => Box::new(ConfigDriveProvider {
                device_root: std::path::PathBuf::from("/dev/disk/by-id"),
                region,
                zone,
            }),
        };
        let node_service = NodeService { node_id, metadata, mount: Box::new(OsMount) };
        server = server.add_service(NodeServer::new(node_service));
    }

    server
        .serve_with_incoming_shutdown(UnixListenerStream::new(listener), async move {
            cancel.cancelled().await;
        })
        .await?;
    tracing::info!("csi plugin stopped gracefully");
    Ok(())
}
