use std::collections::BTreeMap;

/// Transport protocol of a `Service` port. Only these two are meaningful to
/// a STACKIT load balancer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Protocol {
    #[serde(rename = "TCP")]
    Tcp,
    #[serde(rename = "UDP")]
    Udp,
}

impl Protocol {
    pub fn as_lower_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

/// One port entry of a `Service`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePort {
    pub name: Option<String>,
    pub protocol: Protocol,
    /// Port exposed on the load balancer listener.
    pub port: i32,
    /// Port the traffic is forwarded to on the node.
    pub node_port: i32,
}

/// Input `Service` object, trimmed to the fields the reconciler cares about.
/// Immutable for the duration of a single reconcile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub uid: String,
    pub name: String,
    pub namespace: Option<String>,
    pub ports: Vec<ServicePort>,
    pub load_balancer_source_ranges: Vec<String>,
    pub annotations: BTreeMap<String, String>,
}

impl Service {
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// §3 invariant: a multi-port service must name every port.
    pub fn validate(&self) -> Result<(), String> {
        if self.ports.len() > 1 && self.ports.iter().any(|p| p.name.as_deref().unwrap_or("").is_empty())
        {
            return Err("all ports must be named when a service has more than one port".into());
        }
        Ok(())
    }
}
