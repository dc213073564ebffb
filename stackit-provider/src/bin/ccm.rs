use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use stackit_client::{HttpIaasClient, HttpLoadbalancerClient};
use stackit_common::shutdown::shutdown_signal;
use stackit_provider::args::{Cli, Commands, ProbeArgs, RunArgs};
use stackit_provider::config::{ProviderConfig, RegionalityFlag};
use stackit_provider::instances::Instances;
use stackit_provider::provider::StackitProvider;
use stackit_provider::reconcile::LbReconciler;
use stackit_provider::translate::TranslateOptions;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Probe(args) => probe(args).await,
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let cfg = ProviderConfig::from_file(std::path::Path::new(&args.config))?;
    let network_id = cfg
        .network_id()
        .ok_or_else(|| anyhow::anyhow!("no network id configured"))?
        .to_string();

    let http = reqwest::Client::new();
    let lb_client: Arc<dyn stackit_client::LoadbalancerClient> =
        Arc::new(HttpLoadbalancerClient::new(http.clone(), cfg.load_balancer.api.clone()));
    let iaas_client: Arc<dyn stackit_client::NodeClient> =
        Arc::new(HttpIaasClient::new(http, cfg.instances.api.clone()));

    let translate_opts = TranslateOptions {
        default_network_id: network_id,
        extra_labels: cfg.load_balancer.extra_labels.clone(),
    };
    let lb = LbReconciler::new(lb_client, cfg.global.project_id.clone(), translate_opts);
    let mut instances = Instances::new(iaas_client, cfg.global.project_id.clone(), cfg.global.region.clone());
    instances.regional = RegionalityFlag::from_env();

    let provider = StackitProvider { lb, instances };
    // The orchestrator harness that calls into `provider` (watch loop,
    // leader election) is out of scope here; this binary only proves the
    // composition root builds and stays up to serve metrics/health.
    let _provider = provider;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    tracing::info!(project_id = %cfg.global.project_id, region = %cfg.global.region, "ccm ready");
    stackit_common::metrics::serve_metrics(args.metrics_addr, cancel).await?;
    tracing::info!("ccm stopped gracefully");
    Ok(())
}

async fn probe(args: ProbeArgs) -> Result<()> {
    let url = format!("{}/healthz", args.target.trim_end_matches('/'));
    let resp = reqwest::get(&url).await?;
    if resp.status().is_success() {
        println!("ok");
        Ok(())
    } else {
        anyhow::bail!("probe failed: {}", resp.status());
    }
}
