//! Instances adapter (C7): resolves orchestrator `Node`s to IaaS `Server`s
//! and emits node metadata. Grounded on the typed-helper style of
//! `storage-operator/src/util/patch.rs` plus the `iam-client` lookup
//! pattern (a trait method per remote call, errors classified by the
//! adapter rather than the caller).

use std::sync::Arc;

use stackit_client::NodeClient;
use stackit_common::Error;
use stackit_types::{add_to_node_addresses, NodeAddress, NodeAddressType, Server};

use crate::config::{RegionalityFlag, StoppingSentinel};

/// `stackit://{id}` (canonical, no region) or `openstack://{region}/{id}`
/// (legacy, read-only compatibility). Returns `(server_id, region)`; region
/// is empty for the canonical form.
pub fn parse_provider_id(provider_id: &str, configured_region: &str) -> Result<(String, String), Error> {
    if let Some(id) = provider_id.strip_prefix("stackit://") {
        if id.is_empty() {
            return Err(Error::InvalidSpec("empty stackit:// provider id".into()));
        }
        return Ok((id.to_string(), String::new()));
    }
    if let Some(rest) = provider_id.strip_prefix("openstack://") {
        let (region, id) = rest
            .split_once('/')
            .ok_or_else(|| Error::InvalidSpec(format!("malformed legacy provider id {provider_id}")))?;
        if region != configured_region {
            return Err(Error::InvalidSpec(format!(
                "legacy provider id region {region} does not match configured region {configured_region}"
            )));
        }
        return Ok((id.to_string(), region.to_string()));
    }
    Err(Error::InvalidSpec(format!("unrecognized provider id format {provider_id}")))
}

/// Canonical form only; the CCM never writes the legacy `openstack://`
/// shape (read-compatibility only, per the open question in §9).
pub fn make_instance_id(server: &Server) -> String {
    format!("stackit://{}", server.id)
}

/// Strips characters that aren't valid Kubernetes label values, leaving
/// alphanumerics, `-`, `_`, `.`.
pub fn sanitize_zone_label(zone: &str) -> String {
    zone.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_' || *c == '.')
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMetadata {
    pub provider_id: String,
    pub addresses: Vec<NodeAddress>,
    pub zone: String,
    pub region: String,
}

pub struct Instances {
    pub client: Arc<dyn NodeClient>,
    pub project_id: String,
    pub region: String,
    pub regional: RegionalityFlag,
    pub stopping_sentinel: StoppingSentinel,
}

impl Instances {
    pub fn new(client: Arc<dyn NodeClient>, project_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            client,
            project_id: project_id.into(),
            region: region.into(),
            regional: RegionalityFlag::default(),
            stopping_sentinel: StoppingSentinel::default(),
        }
    }

    /// §4.6: empty `ProviderID` falls back to a linear scan by node name.
    pub async fn resolve_server(&self, node: &stackit_types::Node) -> Result<Server, Error> {
        match node.provider_id.as_deref() {
            None | Some("") => {
                let servers = self.client.list_servers(&self.project_id).await?;
                servers
                    .into_iter()
                    .find(|s| s.name == node.name)
                    .ok_or_else(|| Error::NotFound(format!("no server named {}", node.name)))
            }
            Some(provider_id) => {
                let (server_id, _) = parse_provider_id(provider_id, &self.region)?;
                self.client.get_instance_by_id(&self.project_id, &server_id).await
            }
        }
    }

    pub fn instance_shutdown(&self, server: &Server) -> bool {
        server.status == self.stopping_sentinel.0
    }

    pub fn instance_metadata(&self, server: &Server) -> NodeMetadata {
        let mut addresses = Vec::new();
        for nic in &server.network_interfaces {
            if let Some(ipv4) = &nic.ipv4 {
                add_to_node_addresses(
                    &mut addresses,
                    NodeAddress { address_type: NodeAddressType::InternalIp, address: ipv4.clone() },
                );
            }
            if let Some(ipv6) = &nic.ipv6 {
                add_to_node_addresses(
                    &mut addresses,
                    NodeAddress { address_type: NodeAddressType::InternalIp, address: ipv6.clone() },
                );
            }
            if let Some(public_ip) = &nic.public_ip {
                add_to_node_addresses(
                    &mut addresses,
                    NodeAddress { address_type: NodeAddressType::ExternalIp, address: public_ip.clone() },
                );
            }
        }
        add_to_node_addresses(
            &mut addresses,
            NodeAddress { address_type: NodeAddressType::Hostname, address: server.name.clone() },
        );

        NodeMetadata {
            provider_id: make_instance_id(server),
            addresses,
            zone: sanitize_zone_label(&server.availability_zone),
            region: self.region.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s6_canonical_provider_id_has_no_region() {
        assert_eq!(
            parse_provider_id("stackit://srv-1", "eu-01").unwrap(),
            ("srv-1".to_string(), String::new())
        );
    }

    #[test]
    fn s6_legacy_provider_id_with_matching_region() {
        assert_eq!(
            parse_provider_id("openstack://eu-01/srv-1", "eu-01").unwrap(),
            ("srv-1".to_string(), "eu-01".to_string())
        );
    }

    #[test]
    fn s6_legacy_provider_id_with_mismatched_region_fails() {
        assert!(parse_provider_id("openstack://eu-01/srv-1", "eu-02").is_err());
    }

    #[test]
    fn invariant6_round_trips_through_make_and_parse() {
        let server = Server {
            id: "srv-42".into(),
            name: "node-1".into(),
            status: "ACTIVE".into(),
            machine_type: "c1.medium".into(),
            availability_zone: "eu01-1".into(),
            network_interfaces: vec![],
        };
        let id = make_instance_id(&server);
        let (parsed_id, region) = parse_provider_id(&id, "eu-01").unwrap();
        assert_eq!(parsed_id, server.id);
        assert_eq!(region, "");
    }

    #[test]
    fn invariant7_addresses_never_duplicate() {
        let server = Server {
            id: "srv-1".into(),
            name: "node-1".into(),
            status: "ACTIVE".into(),
            machine_type: "c1.medium".into(),
            availability_zone: "eu01-1#invalid!".into(),
            network_interfaces: vec![
                stackit_types::NetworkInterface { ipv4: Some("10.0.0.1".into()), ipv6: None, public_ip: None },
                stackit_types::NetworkInterface { ipv4: Some("10.0.0.1".into()), ipv6: None, public_ip: Some("1.2.3.4".into()) },
            ],
        };
        struct NoopClient;
        #[async_trait::async_trait]
        impl NodeClient for NoopClient {
            async fn list_servers(&self, _: &str) -> Result<Vec<Server>, Error> { Ok(vec![]) }
            async fn get_server(&self, _: &str, _: &str) -> Result<Server, Error> { unreachable!() }
            async fn get_instance_by_id(&self, _: &str, _: &str) -> Result<Server, Error> { unreachable!() }
        }
        let client: Arc<dyn NodeClient> = Arc::new(NoopClient);
        let instances = Instances::new(client, "proj", "eu-01");
        let meta = instances.instance_metadata(&server);
        let ip_count = meta.addresses.iter().filter(|a| a.address == "10.0.0.1").count();
        assert_eq!(ip_count, 1);
        assert_eq!(meta.zone, "eu01-1invalid");
    }

    #[test]
    fn stopping_sentinel_is_configurable() {
        let server = Server {
            id: "1".into(),
            name: "n".into(),
            status: "SHUTOFF".into(),
            machine_type: "t".into(),
            availability_zone: "az".into(),
            network_interfaces: vec![],
        };
        struct NoopClient;
        #[async_trait::async_trait]
        impl NodeClient for NoopClient {
            async fn list_servers(&self, _: &str) -> Result<Vec<Server>, Error> { Ok(vec![]) }
            async fn get_server(&self, _: &str, _: &str) -> Result<Server, Error> { unreachable!() }
            async fn get_instance_by_id(&self, _: &str, _: &str) -> Result<Server, Error> { unreachable!() }
        }
        let client: Arc<dyn NodeClient> = Arc::new(NoopClient);
        let mut instances = Instances::new(client, "proj", "eu-01");
        assert!(!instances.instance_shutdown(&server));
        instances.stopping_sentinel = StoppingSentinel("SHUTOFF".to_string());
        assert!(instances.instance_shutdown(&server));
    }
}
