#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum NodeAddressType {
    InternalIp,
    ExternalIp,
    Hostname,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    pub address_type: NodeAddressType,
    pub address: String,
}

/// Input `Node` object, trimmed to what instance resolution and target
/// selection need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub provider_id: Option<String>,
    pub addresses: Vec<NodeAddress>,
}

impl Node {
    pub fn first_internal_ip(&self) -> Option<&str> {
        self.addresses
            .iter()
            .find(|a| a.address_type == NodeAddressType::InternalIp)
            .map(|a| a.address.as_str())
    }
}

/// Appends `(address, type)` to `addresses` unless that exact pair is
/// already present. Grounded on §8 invariant 7 ("never a duplicate
/// (address, type) pair").
pub fn add_to_node_addresses(addresses: &mut Vec<NodeAddress>, new: NodeAddress) {
    if !addresses
        .iter()
        .any(|a| a.address_type == new.address_type && a.address == new.address)
    {
        addresses.push(new);
    }
}
