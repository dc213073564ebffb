use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Unix domain socket the CO (Kubernetes kubelet) dials, per the CSI spec.
    #[arg(long, env = "CSI_ENDPOINT", default_value = "unix:///csi/csi.sock")]
    pub endpoint: String,

    /// Runs the Controller service alongside Identity (controller-mode pod).
    #[arg(long, env = "CSI_CONTROLLER", default_value_t = false)]
    pub controller: bool,

    /// Runs the Node service alongside Identity (per-node daemonset pod).
    #[arg(long, env = "CSI_NODE", default_value_t = false)]
    pub node: bool,

    #[arg(long, env = "STACKIT_PROJECT_ID")]
    pub project_id: String,

    #[arg(long, env = "STACKIT_IAAS_API", default_value = "https://iaas.api.stackit.cloud")]
    pub iaas_api: String,

    #[arg(long, env = "NODE_ID")]
    pub node_id: Option<String>,

    #[arg(long, env = "STACKIT_REGION")]
    pub region: Option<String>,

    #[arg(long, env = "STACKIT_ZONE")]
    pub zone: Option<String>,

    #[arg(long, env = "METADATA_SERVICE_ENDPOINT")]
    pub metadata_endpoint: Option<String>,

    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    pub metrics_addr: std::net::SocketAddr,
}
