//! Wire-format DTOs for the LB and IaaS HTTP APIs.
//!
//! The upstream SDKs expose every optional field as a pointer; these structs
//! mirror that wire shape (`Option<T>`, `skip_serializing_if`) and convert
//! to/from the pointer-free domain types in `stackit_types` at the adapter
//! boundary, per the teacher's `iam-client` DTO style
//! (`User`/`JwtLike`/`RegisterRequest`).

use serde::{Deserialize, Serialize};
use stackit_types::*;

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NetworkDto {
    #[serde(rename = "networkId")]
    pub network_id: String,
    pub role: String,
}

impl From<&Network> for NetworkDto {
    fn from(n: &Network) -> Self {
        Self {
            network_id: n.network_id.clone(),
            role: match n.role {
                NetworkRole::Listeners => "LISTENERS",
                NetworkRole::Targets => "TARGETS",
                NetworkRole::ListenersAndTargets => "LISTENERS_AND_TARGETS",
            }
            .to_string(),
        }
    }
}

impl TryFrom<NetworkDto> for Network {
    type Error = String;
    fn try_from(d: NetworkDto) -> Result<Self, String> {
        let role = match d.role.as_str() {
            "LISTENERS" => NetworkRole::Listeners,
            "TARGETS" => NetworkRole::Targets,
            "LISTENERS_AND_TARGETS" => NetworkRole::ListenersAndTargets,
            other => return Err(format!("unknown network role {other}")),
        };
        Ok(Network {
            network_id: d.network_id,
            role,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListenerDto {
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub port: i32,
    #[serde(rename = "targetPool")]
    pub target_pool: String,
    pub protocol: String,
    #[serde(rename = "tcpIdleTimeout", skip_serializing_if = "Option::is_none")]
    pub tcp_idle_timeout: Option<String>,
    #[serde(rename = "udpIdleTimeout", skip_serializing_if = "Option::is_none")]
    pub udp_idle_timeout: Option<String>,
}

impl From<&Listener> for ListenerDto {
    fn from(l: &Listener) -> Self {
        let (protocol, tcp, udp) = match l.protocol {
            ListenerProtocol::Tcp => ("TCP", l.idle_timeout_seconds.clone(), None),
            ListenerProtocol::TcpProxy => ("TCP_PROXY", l.idle_timeout_seconds.clone(), None),
            ListenerProtocol::Udp => ("UDP", None, l.idle_timeout_seconds.clone()),
        };
        Self {
            display_name: l.display_name.clone(),
            port: l.port,
            target_pool: l.target_pool.clone(),
            protocol: protocol.to_string(),
            tcp_idle_timeout: tcp,
            udp_idle_timeout: udp,
        }
    }
}

impl TryFrom<ListenerDto> for Listener {
    type Error = String;
    fn try_from(d: ListenerDto) -> Result<Self, String> {
        let protocol = match d.protocol.as_str() {
            "TCP" => ListenerProtocol::Tcp,
            "TCP_PROXY" => ListenerProtocol::TcpProxy,
            "UDP" => ListenerProtocol::Udp,
            other => return Err(format!("unknown listener protocol {other}")),
        };
        let idle = d.tcp_idle_timeout.or(d.udp_idle_timeout);
        Ok(Listener {
            display_name: d.display_name,
            port: d.port,
            target_pool: d.target_pool,
            protocol,
            idle_timeout_seconds: idle,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TargetDto {
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub ip: String,
}

impl From<&Target> for TargetDto {
    fn from(t: &Target) -> Self {
        Self {
            display_name: t.display_name.clone(),
            ip: t.ip.clone(),
        }
    }
}

impl From<TargetDto> for Target {
    fn from(d: TargetDto) -> Self {
        Target {
            display_name: d.display_name,
            ip: d.ip,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActiveHealthCheckDto {
    #[serde(rename = "intervalSeconds")]
    pub interval_seconds: u32,
    #[serde(rename = "timeoutSeconds")]
    pub timeout_seconds: u32,
    pub retries: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TargetPoolDto {
    pub name: String,
    #[serde(rename = "targetPort")]
    pub target_port: i32,
    pub targets: Vec<TargetDto>,
    #[serde(rename = "sessionPersistence", default, skip_serializing_if = "is_false")]
    pub session_persistence: bool,
    #[serde(rename = "activeHealthCheck", skip_serializing_if = "Option::is_none")]
    pub active_health_check: Option<ActiveHealthCheckDto>,
}

impl From<&TargetPool> for TargetPoolDto {
    fn from(p: &TargetPool) -> Self {
        Self {
            name: p.name.clone(),
            target_port: p.target_port,
            targets: p.targets.iter().map(TargetDto::from).collect(),
            session_persistence: p.session_persistence,
            active_health_check: p.active_health_check.as_ref().map(|h| ActiveHealthCheckDto {
                interval_seconds: h.interval_seconds,
                timeout_seconds: h.timeout_seconds,
                retries: h.retries,
            }),
        }
    }
}

impl From<TargetPoolDto> for TargetPool {
    fn from(d: TargetPoolDto) -> Self {
        TargetPool {
            name: d.name,
            target_port: d.target_port,
            targets: d.targets.into_iter().map(Target::from).collect(),
            session_persistence: d.session_persistence,
            active_health_check: d.active_health_check.map(|h| ActiveHealthCheck {
                interval_seconds: h.interval_seconds,
                timeout_seconds: h.timeout_seconds,
                retries: h.retries,
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ObservabilityTargetDto {
    #[serde(rename = "pushUrl")]
    pub push_url: String,
    #[serde(rename = "credentialsRef")]
    pub credentials_ref: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ObservabilityDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ObservabilityTargetDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<ObservabilityTargetDto>,
}

impl From<&ObservabilityBlock> for ObservabilityDto {
    fn from(o: &ObservabilityBlock) -> Self {
        Self {
            metrics: o.metrics.as_ref().map(|t| ObservabilityTargetDto {
                push_url: t.push_url.clone(),
                credentials_ref: t.credentials_ref.clone(),
            }),
            logs: o.logs.as_ref().map(|t| ObservabilityTargetDto {
                push_url: t.push_url.clone(),
                credentials_ref: t.credentials_ref.clone(),
            }),
        }
    }
}

impl From<ObservabilityDto> for ObservabilityBlock {
    fn from(d: ObservabilityDto) -> Self {
        Self {
            metrics: d.metrics.map(|t| ObservabilityTarget {
                push_url: t.push_url,
                credentials_ref: t.credentials_ref,
            }),
            logs: d.logs.map(|t| ObservabilityTarget {
                push_url: t.push_url,
                credentials_ref: t.credentials_ref,
            }),
        }
    }
}

/// Request/response body for `CreateLoadBalancer`/`UpdateLoadBalancer` and
/// the `Get` response.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoadBalancerDto {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "privateNetworkOnly", default, skip_serializing_if = "is_false")]
    pub private_network_only: bool,
    #[serde(rename = "externalAddress", skip_serializing_if = "Option::is_none")]
    pub external_address: Option<String>,
    #[serde(rename = "privateAddress", skip_serializing_if = "Option::is_none")]
    pub private_address: Option<String>,
    #[serde(rename = "ephemeralAddress", default, skip_serializing_if = "is_false")]
    pub ephemeral_address: bool,
    #[serde(rename = "planId")]
    pub plan_id: String,
    pub networks: Vec<NetworkDto>,
    pub listeners: Vec<ListenerDto>,
    #[serde(rename = "targetPools")]
    pub target_pools: Vec<TargetPoolDto>,
    #[serde(rename = "accessControl", default)]
    pub access_control_source_ranges: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityDto>,
    #[serde(rename = "extraLabels", default, skip_serializing_if = "std::collections::BTreeMap::is_empty")]
    pub extra_labels: std::collections::BTreeMap<String, String>,
}

impl LoadBalancerDto {
    pub fn from_spec(spec: &LoadBalancerSpec, version: Option<&str>, status: Option<LbStatus>) -> Self {
        Self {
            name: spec.name.clone(),
            version: version.map(str::to_string),
            status: status.map(|s| {
                match s {
                    LbStatus::Pending => "PENDING",
                    LbStatus::Ready => "READY",
                    LbStatus::Terminating => "TERMINATING",
                    LbStatus::Error => "ERROR",
                }
                .to_string()
            }),
            private_network_only: spec.private_network_only,
            external_address: spec.external_address.map(|a| a.to_string()),
            private_address: None,
            ephemeral_address: spec.ephemeral_address,
            plan_id: spec.plan_id.as_str().to_string(),
            networks: spec.networks.iter().map(NetworkDto::from).collect(),
            listeners: spec.listeners.iter().map(ListenerDto::from).collect(),
            target_pools: spec.target_pools.iter().map(TargetPoolDto::from).collect(),
            access_control_source_ranges: spec.access_control_source_ranges.clone(),
            observability: spec.observability.as_ref().map(ObservabilityDto::from),
            extra_labels: spec.extra_labels.clone(),
        }
    }

    pub fn into_domain(self) -> Result<LoadBalancer, String> {
        let status = match self.status.as_deref() {
            Some("PENDING") => LbStatus::Pending,
            Some("READY") => LbStatus::Ready,
            Some("TERMINATING") => LbStatus::Terminating,
            Some("ERROR") => LbStatus::Error,
            other => return Err(format!("missing or unknown lb status: {other:?}")),
        };
        let plan_id = Plan::from_str(&self.plan_id)
            .ok_or_else(|| format!("unknown plan id {}", self.plan_id))?;
        let networks = self
            .networks
            .into_iter()
            .map(Network::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let listeners = self
            .listeners
            .into_iter()
            .map(Listener::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let target_pools = self.target_pools.into_iter().map(TargetPool::from).collect();
        let external_address = self
            .external_address
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(|e| format!("invalid external address: {e}"))?;
        Ok(LoadBalancer {
            version: self.version.ok_or("missing version")?,
            status,
            private_address: self.private_address,
            spec: LoadBalancerSpec {
                name: self.name,
                private_network_only: self.private_network_only,
                external_address,
                ephemeral_address: self.ephemeral_address,
                plan_id,
                networks,
                listeners,
                target_pools,
                access_control_source_ranges: self.access_control_source_ranges,
                observability: self.observability.map(ObservabilityBlock::from),
                extra_labels: self.extra_labels,
            },
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NetworkInterfaceDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<String>,
    #[serde(rename = "publicIp", skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
}

impl From<NetworkInterfaceDto> for NetworkInterface {
    fn from(d: NetworkInterfaceDto) -> Self {
        NetworkInterface {
            ipv4: d.ipv4,
            ipv6: d.ipv6,
            public_ip: d.public_ip,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServerDto {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(rename = "machineType")]
    pub machine_type: String,
    #[serde(rename = "availabilityZone")]
    pub availability_zone: String,
    #[serde(rename = "networkInterfaces", default)]
    pub network_interfaces: Vec<NetworkInterfaceDto>,
}

impl From<ServerDto> for Server {
    fn from(d: ServerDto) -> Self {
        Server {
            id: d.id,
            name: d.name,
            status: d.status,
            machine_type: d.machine_type,
            availability_zone: d.availability_zone,
            network_interfaces: d.network_interfaces.into_iter().map(NetworkInterface::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VolumeSourceDto {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VolumeDto {
    pub id: String,
    pub name: String,
    #[serde(rename = "sizeGib")]
    pub size_gib: i64,
    pub status: String,
    #[serde(rename = "availabilityZone")]
    pub availability_zone: String,
    #[serde(rename = "serverId", skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<VolumeSourceDto>,
}

impl VolumeDto {
    pub fn into_domain(self) -> Result<Volume, String> {
        let status = match self.status.as_str() {
            "CREATING" => VolumeStatus::Creating,
            "AVAILABLE" => VolumeStatus::Available,
            "IN_USE" => VolumeStatus::InUse,
            "ERROR" => VolumeStatus::Error,
            "DELETING" => VolumeStatus::Deleting,
            other => return Err(format!("unknown volume status {other}")),
        };
        let source = self
            .source
            .map(|s| match s.kind.as_str() {
                "snapshot" => Ok(VolumeSource::Snapshot(s.id)),
                "volume" => Ok(VolumeSource::Volume(s.id)),
                other => Err(format!("unknown volume source kind {other}")),
            })
            .transpose()?;
        Ok(Volume {
            id: self.id,
            name: self.name,
            size_gib: self.size_gib,
            status,
            availability_zone: self.availability_zone,
            server_id: self.server_id,
            source,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotDto {
    pub id: String,
    pub name: String,
    #[serde(rename = "sourceVolumeId")]
    pub source_volume_id: String,
    pub status: String,
    #[serde(rename = "sizeGib")]
    pub size_gib: i64,
    #[serde(rename = "createdAt")]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl SnapshotDto {
    pub fn into_domain(self) -> Result<Snapshot, String> {
        let status = match self.status.as_str() {
            "CREATING" => SnapshotStatus::Creating,
            "READY" => SnapshotStatus::Ready,
            "ERROR" => SnapshotStatus::Error,
            "DELETING" => SnapshotStatus::Deleting,
            other => return Err(format!("unknown snapshot status {other}")),
        };
        Ok(Snapshot {
            id: self.id,
            name: self.name,
            source_volume_id: self.source_volume_id,
            status,
            size_gib: self.size_gib,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BackupDto {
    pub id: String,
    pub name: String,
    #[serde(rename = "sourceVolumeId")]
    pub source_volume_id: String,
    #[serde(rename = "snapshotId")]
    pub snapshot_id: String,
    pub status: String,
    #[serde(rename = "sizeGib")]
    pub size_gib: i64,
    #[serde(rename = "createdAt")]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl BackupDto {
    pub fn into_domain(self) -> Result<Backup, String> {
        let status = match self.status.as_str() {
            "CREATING" => BackupStatus::Creating,
            "READY" => BackupStatus::Ready,
            "ERROR" => BackupStatus::Error,
            "DELETING" => BackupStatus::Deleting,
            other => return Err(format!("unknown backup status {other}")),
        };
        Ok(Backup {
            id: self.id,
            name: self.name,
            source_volume_id: self.source_volume_id,
            snapshot_id: self.snapshot_id,
            status,
            size_gib: self.size_gib,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CredentialsDto {
    #[serde(rename = "credentialsRef")]
    pub credentials_ref: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "pushUrl")]
    pub push_url: String,
    pub user: String,
    #[serde(default)]
    pub password: String,
}

impl From<CredentialsDto> for ObservabilityCredentials {
    fn from(d: CredentialsDto) -> Self {
        ObservabilityCredentials {
            credentials_ref: d.credentials_ref,
            display_name: d.display_name,
            push_url: d.push_url,
            user: d.user,
            password: d.password,
        }
    }
}
