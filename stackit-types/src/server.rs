#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetworkInterface {
    pub ipv4: Option<String>,
    pub ipv6: Option<String>,
    pub public_ip: Option<String>,
}

/// Server status as surfaced by the IaaS API. The value compared in
/// `InstanceShutdown` is configurable (see §9 open question) rather than a
/// hardcoded string, so `stopping_sentinel` in `stackit-provider::config`
/// decides what counts as "shut down".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub id: String,
    pub name: String,
    pub status: String,
    pub machine_type: String,
    pub availability_zone: String,
    pub network_interfaces: Vec<NetworkInterface>,
}
