#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum LbStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "READY")]
    Ready,
    #[serde(rename = "TERMINATING")]
    Terminating,
    #[serde(rename = "ERROR")]
    Error,
}

/// Plan / flavor IDs recognized by the LB API. Ordered cheapest-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Plan {
    #[serde(rename = "p10")]
    P10,
    #[serde(rename = "p50")]
    P50,
    #[serde(rename = "p250")]
    P250,
    #[serde(rename = "p750")]
    P750,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::P10 => "p10",
            Plan::P50 => "p50",
            Plan::P250 => "p250",
            Plan::P750 => "p750",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "p10" => Some(Plan::P10),
            "p50" => Some(Plan::P50),
            "p250" => Some(Plan::P250),
            "p750" => Some(Plan::P750),
            _ => None,
        }
    }
}

impl Default for Plan {
    fn default() -> Self {
        Plan::P10
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum NetworkRole {
    #[serde(rename = "LISTENERS")]
    Listeners,
    #[serde(rename = "TARGETS")]
    Targets,
    #[serde(rename = "LISTENERS_AND_TARGETS")]
    ListenersAndTargets,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub network_id: String,
    pub role: NetworkRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ListenerProtocol {
    #[serde(rename = "TCP")]
    Tcp,
    #[serde(rename = "TCP_PROXY")]
    TcpProxy,
    #[serde(rename = "UDP")]
    Udp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listener {
    pub display_name: String,
    pub port: i32,
    pub target_pool: String,
    pub protocol: ListenerProtocol,
    /// Whole-second idle timeout, already formatted as the API expects
    /// (string form, e.g. `"3600"`). `None` for protocols without one.
    pub idle_timeout_seconds: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub display_name: String,
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActiveHealthCheck {
    pub interval_seconds: u32,
    pub timeout_seconds: u32,
    pub retries: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPool {
    pub name: String,
    pub target_port: i32,
    pub targets: Vec<Target>,
    pub session_persistence: bool,
    pub active_health_check: Option<ActiveHealthCheck>,
}

/// One sub-block (metrics or logs) of the observability configuration.
/// Diffed on `push_url` + `credentials_ref` only, per §4.2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityTarget {
    pub push_url: String,
    pub credentials_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObservabilityBlock {
    pub metrics: Option<ObservabilityTarget>,
    pub logs: Option<ObservabilityTarget>,
}

impl ObservabilityBlock {
    pub fn credentials_ref(&self) -> Option<&str> {
        self.metrics
            .as_ref()
            .map(|t| t.credentials_ref.as_str())
            .or_else(|| self.logs.as_ref().map(|t| t.credentials_ref.as_str()))
    }
}

/// Side-resource keyed by `credentials_ref`. `display_name` is set to the
/// owning LB's name so orphans are discoverable by a list+filter sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityCredentials {
    pub credentials_ref: String,
    pub display_name: String,
    pub push_url: String,
    pub user: String,
    pub password: String,
}

/// Desired state produced by the spec translator (§4.1). Carries no
/// server-assigned fields (`version`, `status`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancerSpec {
    pub name: String,
    pub private_network_only: bool,
    pub external_address: Option<std::net::Ipv4Addr>,
    pub ephemeral_address: bool,
    pub plan_id: Plan,
    pub networks: Vec<Network>,
    pub listeners: Vec<Listener>,
    pub target_pools: Vec<TargetPool>,
    pub access_control_source_ranges: Vec<String>,
    pub observability: Option<ObservabilityBlock>,
    /// Operator-configured labels applied on create (`loadBalancer.extraLabels`, §6).
    pub extra_labels: std::collections::BTreeMap<String, String>,
}

/// Observed IaaS resource: the spec fields plus server-assigned metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancer {
    pub version: String,
    pub status: LbStatus,
    pub private_address: Option<String>,
    pub spec: LoadBalancerSpec,
}

impl LoadBalancer {
    pub fn external_address_str(&self) -> Option<String> {
        self.spec.external_address.map(|ip| ip.to_string())
    }

    /// Ingress address the orchestrator should publish on the service
    /// status, per §4.3 `Get`.
    pub fn ingress_address(&self) -> Option<String> {
        if self.spec.private_network_only {
            self.private_address.clone()
        } else {
            self.external_address_str()
        }
    }
}
