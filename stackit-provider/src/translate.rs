//! Spec translator (C4): `(Service, Nodes, Options, Observability) -> (LoadBalancerSpec, Vec<Warning>)`.
//! Pure and deterministic, grounded on the teacher's pure-function planner
//! style (`storage-operator/clusters/planner.rs`): no I/O, dense unit tests.

use std::net::Ipv4Addr;

use stackit_common::Error;
use stackit_types::{
    ListenerProtocol, Network, NetworkRole, Node, ObservabilityBlock, Plan, Service, ServicePort,
    Target, TargetPool, Listener, LoadBalancerSpec,
};

use crate::annotations::{self, unsupported_legacy_present};

const MAX_NAME_LEN: usize = 63;
const DEFAULT_TCP_IDLE_SECONDS: u32 = 60 * 60;
const DEFAULT_UDP_IDLE_SECONDS: u32 = 2 * 60;

/// Warning events produced alongside the spec. Never fatal; the reconciler
/// forwards these to the orchestrator's event recorder before calling the
/// API (§4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub reason: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct TranslateOptions {
    pub default_network_id: String,
    /// `loadBalancer.extraLabels` from config (§6), applied to every spec
    /// this translator produces.
    pub extra_labels: std::collections::BTreeMap<String, String>,
}

/// Exact legacy `flavorId` -> plan lookup, consulted before the approximate
/// table. Table contents are illustrative of the shape the real SDK's
/// flavor catalogue would populate at startup.
const LEGACY_FLAVOR_EXACT: &[(&str, Plan)] = &[
    ("lb-small", Plan::P10),
    ("lb-medium", Plan::P50),
    ("lb-large", Plan::P250),
    ("lb-xlarge", Plan::P750),
];

/// Approximate (prefix) match, consulted when no exact hit is found.
const LEGACY_FLAVOR_APPROX_PREFIX: &[(&str, Plan)] = &[
    ("lb-s", Plan::P10),
    ("lb-m", Plan::P50),
    ("lb-l", Plan::P250),
    ("lb-x", Plan::P750),
];

pub(crate) fn lb_name(uid: &str, name: &str) -> String {
    let raw = format!("k8s-svc-{uid}-{name}");
    let truncated = if raw.len() > MAX_NAME_LEN {
        // Truncate on a char boundary at or before MAX_NAME_LEN.
        let mut end = MAX_NAME_LEN;
        while !raw.is_char_boundary(end) {
            end -= 1;
        }
        &raw[..end]
    } else {
        raw.as_str()
    };
    truncated.trim_end_matches('-').to_string()
}

fn select_plan(service: &Service) -> Result<(Plan, Vec<Warning>), Error> {
    if let Some(explicit) = service.annotation(annotations::PREFERRED_PLAN_ID) {
        let plan = Plan::from_str(explicit)
            .ok_or_else(|| Error::InvalidSpec(format!("unknown plan id {explicit}")))?;
        return Ok((plan, vec![]));
    }
    if let Some(legacy) = service.annotation(annotations::LEGACY_FLAVOR_ID) {
        if let Some((_, plan)) = LEGACY_FLAVOR_EXACT.iter().find(|(k, _)| *k == legacy) {
            return Ok((
                *plan,
                vec![Warning {
                    reason: "SelectedPlanID".into(),
                    message: format!("legacy flavorId {legacy} mapped to plan {}", plan.as_str()),
                }],
            ));
        }
        if let Some((_, plan)) = LEGACY_FLAVOR_APPROX_PREFIX.iter().find(|(k, _)| legacy.starts_with(*k)) {
            return Ok((
                *plan,
                vec![Warning {
                    reason: "SelectedPlanID".into(),
                    message: format!("legacy flavorId {legacy} approximately mapped to plan {}", plan.as_str()),
                }],
            ));
        }
    }
    Ok((Plan::default(), vec![]))
}

fn build_networks(service: &Service, opts: &TranslateOptions) -> Vec<Network> {
    match service.annotation(annotations::PREFERRED_LISTENER_NETWORK) {
        Some(listener_network) if !listener_network.is_empty() => vec![
            Network {
                network_id: listener_network.to_string(),
                role: NetworkRole::Listeners,
            },
            Network {
                network_id: opts.default_network_id.clone(),
                role: NetworkRole::Targets,
            },
        ],
        _ => vec![Network {
            network_id: opts.default_network_id.clone(),
            role: NetworkRole::ListenersAndTargets,
        }],
    }
}

fn resolve_private_network_only(service: &Service) -> Result<bool, Error> {
    Ok(annotations::resolve_bool(
        service,
        annotations::PREFERRED_INTERNAL_LB,
        annotations::LEGACY_INTERNAL_LB,
    )?
    .unwrap_or(false))
}

fn resolve_external_address(
    service: &Service,
    private_only: bool,
) -> Result<(Option<Ipv4Addr>, bool), Error> {
    if private_only {
        return Ok((None, false));
    }
    let addr = annotations::resolve(
        service,
        annotations::PREFERRED_EXISTING_EXTERNAL_IP,
        annotations::LEGACY_EXISTING_EXTERNAL_IP,
    )?;
    match addr {
        Some(raw) => {
            let ip: Ipv4Addr = raw
                .parse()
                .map_err(|_| Error::InvalidSpec(format!("invalid IPv4 external address {raw}")))?;
            Ok((Some(ip), false))
        }
        None => Ok((None, true)),
    }
}

/// Idle timeout resolution (§4.1: "conflicting preferred+legacy values
/// fail"), so this goes through the same strict [`annotations::resolve`]
/// conflict check every other dual-sourced field uses rather than silently
/// preferring one side.
fn resolve_idle_timeout_seconds(
    service: &Service,
    preferred_key: &str,
    legacy_key: &str,
    default: u32,
) -> Result<u32, Error> {
    let raw = annotations::resolve(service, preferred_key, legacy_key)?;
    Ok(raw.and_then(parse_duration_secs).unwrap_or(default))
}

/// Parses `"30s"`, `"5m"`, `"1h"`, or a bare integer (seconds).
fn parse_duration_secs(s: &str) -> Option<u32> {
    let s = s.trim();
    if let Ok(n) = s.parse::<u32>() {
        return Some(n);
    }
    let (num, unit) = s.split_at(s.len().checked_sub(1)?);
    let n: u32 = num.parse().ok()?;
    match unit {
        "s" => Some(n),
        "m" => Some(n.saturating_mul(60)),
        "h" => Some(n.saturating_mul(3600)),
        _ => None,
    }
}

struct ProxyProtocolConfig {
    enabled: bool,
    ports_filter: Option<Vec<i32>>,
}

fn resolve_proxy_protocol(service: &Service) -> Result<ProxyProtocolConfig, Error> {
    let enabled = annotations::resolve_bool(
        service,
        annotations::PREFERRED_PROXY_PROTOCOL,
        annotations::LEGACY_PROXY_PROTOCOL,
    )?
    .unwrap_or(false);
    let filter_raw = annotations::resolve(
        service,
        annotations::PREFERRED_PROXY_PROTOCOL_PORTS_FILTER,
        annotations::LEGACY_PROXY_PROTOCOL_PORTS_FILTER,
    )?;
    let ports_filter = match filter_raw {
        Some(raw) if !raw.trim().is_empty() => Some(
            raw.split(',')
                .map(|p| {
                    p.trim()
                        .parse::<i32>()
                        .map_err(|_| Error::InvalidSpec(format!("invalid port in proxy protocol filter: {p}")))
                })
                .collect::<Result<Vec<_>, _>>()?,
        ),
        _ => None,
    };
    Ok(ProxyProtocolConfig { enabled, ports_filter })
}

fn port_base_name(port: &ServicePort) -> String {
    match &port.name {
        Some(n) if !n.is_empty() => n.clone(),
        _ => format!("port-{}-{}", port.protocol.as_lower_str(), port.port),
    }
}

fn build_targets(nodes: &[Node]) -> Vec<Target> {
    nodes
        .iter()
        .filter_map(|n| {
            n.first_internal_ip().map(|ip| Target {
                display_name: n.name.clone(),
                ip: ip.to_string(),
            })
        })
        .collect()
}

fn resolve_access_control(service: &Service) -> Vec<String> {
    if !service.load_balancer_source_ranges.is_empty() {
        return service.load_balancer_source_ranges.clone();
    }
    service
        .annotation(annotations::LEGACY_ACCESS_CONTROL_SOURCE_RANGES)
        .map(|raw| raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

pub fn translate(
    service: &Service,
    nodes: &[Node],
    opts: &TranslateOptions,
    observability: Option<ObservabilityBlock>,
) -> Result<(LoadBalancerSpec, Vec<Warning>), Error> {
    service.validate().map_err(Error::InvalidSpec)?;

    let mut warnings = Vec::new();

    let name = lb_name(&service.uid, &service.name);
    let private_network_only = resolve_private_network_only(service)?;
    let (external_address, ephemeral_address) = resolve_external_address(service, private_network_only)?;
    let (plan_id, plan_warnings) = select_plan(service)?;
    warnings.extend(plan_warnings);
    let networks = build_networks(service, opts);
    let proxy = resolve_proxy_protocol(service)?;
    let session_persistence = annotations::resolve_bool(
        service,
        annotations::PREFERRED_SESSION_PERSISTENCE,
        annotations::PREFERRED_SESSION_PERSISTENCE,
    )?
    .unwrap_or(false);

    let tcp_idle = resolve_idle_timeout_seconds(
        service,
        annotations::PREFERRED_TCP_IDLE_TIMEOUT,
        annotations::LEGACY_TCP_IDLE_TIMEOUT,
        DEFAULT_TCP_IDLE_SECONDS,
    )?;
    let udp_idle = resolve_idle_timeout_seconds(
        service,
        annotations::PREFERRED_UDP_IDLE_TIMEOUT,
        annotations::LEGACY_UDP_IDLE_TIMEOUT,
        DEFAULT_UDP_IDLE_SECONDS,
    )?;

    let targets = build_targets(nodes);

    let mut listeners = Vec::with_capacity(service.ports.len());
    let mut target_pools = Vec::with_capacity(service.ports.len());

    for port in &service.ports {
        let pool_name = port_base_name(port);
        let is_tcp = matches!(port.protocol, stackit_types::Protocol::Tcp);
        let wants_proxy = is_tcp
            && proxy.enabled
            && proxy
                .ports_filter
                .as_ref()
                .map(|filter| filter.contains(&port.port))
                .unwrap_or(true);

        let protocol = if wants_proxy {
            ListenerProtocol::TcpProxy
        } else if is_tcp {
            ListenerProtocol::Tcp
        } else {
            ListenerProtocol::Udp
        };

        let idle_timeout_seconds = Some(if is_tcp { tcp_idle } else { udp_idle }.to_string());

        listeners.push(Listener {
            display_name: pool_name.clone(),
            port: port.port,
            target_pool: pool_name.clone(),
            protocol,
            idle_timeout_seconds,
        });

        target_pools.push(TargetPool {
            name: pool_name,
            target_port: port.node_port,
            targets: targets.clone(),
            session_persistence,
            active_health_check: None,
        });
    }

    let unsupported = unsupported_legacy_present(service);
    if !unsupported.is_empty() {
        warnings.push(Warning {
            reason: "UnsupportedAnnotation".into(),
            message: format!("unsupported legacy annotations present: {}", unsupported.join(", ")),
        });
    }

    let spec = LoadBalancerSpec {
        name,
        private_network_only,
        external_address,
        ephemeral_address,
        plan_id,
        networks,
        listeners,
        target_pools,
        access_control_source_ranges: resolve_access_control(service),
        observability,
        extra_labels: opts.extra_labels.clone(),
    };

    Ok((spec, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use stackit_types::{NodeAddress, NodeAddressType, Protocol};

    fn node(name: &str, ip: &str) -> Node {
        Node {
            name: name.to_string(),
            provider_id: None,
            addresses: vec![NodeAddress {
                address_type: NodeAddressType::InternalIp,
                address: ip.to_string(),
            }],
        }
    }

    fn opts() -> TranslateOptions {
        TranslateOptions {
            default_network_id: "net-default".into(),
            ..Default::default()
        }
    }

    fn service(annotations: &[(&str, &str)], ports: Vec<ServicePort>) -> Service {
        Service {
            uid: "abcd".into(),
            name: "web".into(),
            namespace: None,
            ports,
            load_balancer_source_ranges: vec![],
            annotations: annotations.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<BTreeMap<_, _>>(),
        }
    }

    fn two_tcp_ports() -> Vec<ServicePort> {
        vec![
            ServicePort { name: Some("http".into()), protocol: Protocol::Tcp, port: 80, node_port: 30080 },
            ServicePort { name: Some("https".into()), protocol: Protocol::Tcp, port: 443, node_port: 30443 },
        ]
    }

    #[test]
    fn s1_first_reconcile_public_lb() {
        let svc = service(&[], two_tcp_ports());
        let nodes = vec![node("n1", "10.0.0.1")];
        let (spec, warnings) = translate(&svc, &nodes, &opts(), None).unwrap();
        assert_eq!(spec.name, "k8s-svc-abcd-web");
        assert_eq!(spec.plan_id, Plan::P10);
        assert!(spec.ephemeral_address);
        assert_eq!(spec.listeners.len(), 2);
        assert_eq!(spec.target_pools.len(), 2);
        assert_eq!(spec.networks.len(), 1);
        assert_eq!(spec.networks[0].role, NetworkRole::ListenersAndTargets);
        assert!(warnings.is_empty());
    }

    #[test]
    fn s2_annotation_conflict_is_invalid_spec() {
        let svc = service(
            &[
                (annotations::PREFERRED_INTERNAL_LB, "true"),
                (annotations::LEGACY_INTERNAL_LB, "false"),
            ],
            two_tcp_ports(),
        );
        let err = translate(&svc, &[], &opts(), None).unwrap_err();
        assert!(matches!(err, Error::InvalidSpec(_)));
    }

    #[test]
    fn configured_extra_labels_are_applied_to_the_spec() {
        let svc = service(&[], two_tcp_ports());
        let opts = TranslateOptions {
            default_network_id: "net-default".into(),
            extra_labels: BTreeMap::from([("team".to_string(), "platform".to_string())]),
        };
        let (spec, _) = translate(&svc, &[], &opts, None).unwrap();
        assert_eq!(spec.extra_labels.get("team"), Some(&"platform".to_string()));
    }

    #[test]
    fn conflicting_idle_timeout_annotations_is_invalid_spec() {
        let svc = service(
            &[
                (annotations::PREFERRED_TCP_IDLE_TIMEOUT, "30s"),
                (annotations::LEGACY_TCP_IDLE_TIMEOUT, "45s"),
            ],
            two_tcp_ports(),
        );
        let err = translate(&svc, &[], &opts(), None).unwrap_err();
        assert!(matches!(err, Error::InvalidSpec(_)));
    }

    #[test]
    fn invariant1_name_is_63_chars_max_and_has_no_trailing_dash() {
        let long_name = "x".repeat(80);
        let name = lb_name("abcd", &long_name);
        assert!(name.len() <= MAX_NAME_LEN);
        assert!(!name.ends_with('-'));
    }

    #[test]
    fn invariant2_internal_lb_implies_private_network_and_no_ephemeral() {
        let svc = service(&[(annotations::PREFERRED_INTERNAL_LB, "true")], two_tcp_ports());
        let (spec, _) = translate(&svc, &[], &opts(), None).unwrap();
        assert!(spec.private_network_only);
        assert!(!spec.ephemeral_address);
        assert!(spec.external_address.is_none());
    }

    #[test]
    fn listener_network_annotation_splits_listener_and_target_networks() {
        let svc = service(
            &[(annotations::PREFERRED_LISTENER_NETWORK, "net-public")],
            two_tcp_ports(),
        );
        let (spec, _) = translate(&svc, &[], &opts(), None).unwrap();
        assert_eq!(spec.networks.len(), 2);
        assert_eq!(spec.networks[0].network_id, "net-public");
        assert_eq!(spec.networks[0].role, NetworkRole::Listeners);
        assert_eq!(spec.networks[1].role, NetworkRole::Targets);
    }

    #[test]
    fn legacy_flavor_exact_match_emits_deprecation_warning() {
        let svc = service(&[(annotations::LEGACY_FLAVOR_ID, "lb-large")], two_tcp_ports());
        let (spec, warnings) = translate(&svc, &[], &opts(), None).unwrap();
        assert_eq!(spec.plan_id, Plan::P250);
        assert_eq!(warnings[0].reason, "SelectedPlanID");
    }

    #[test]
    fn targets_skip_nodes_without_internal_ip() {
        let svc = service(&[], two_tcp_ports());
        let nodes = vec![
            node("n1", "10.0.0.1"),
            Node { name: "n2".into(), provider_id: None, addresses: vec![] },
        ];
        let (spec, _) = translate(&svc, &nodes, &opts(), None).unwrap();
        assert_eq!(spec.target_pools[0].targets.len(), 1);
        assert_eq!(spec.target_pools[0].targets[0].display_name, "n1");
    }

    #[test]
    fn proxy_protocol_filter_only_applies_to_listed_ports() {
        let svc = service(
            &[
                (annotations::PREFERRED_PROXY_PROTOCOL, "true"),
                (annotations::PREFERRED_PROXY_PROTOCOL_PORTS_FILTER, "80"),
            ],
            two_tcp_ports(),
        );
        let (spec, _) = translate(&svc, &[], &opts(), None).unwrap();
        assert_eq!(spec.listeners[0].protocol, ListenerProtocol::TcpProxy);
        assert_eq!(spec.listeners[1].protocol, ListenerProtocol::Tcp);
    }

    #[test]
    fn udp_listener_never_gets_proxy_protocol() {
        let svc = service(
            &[(annotations::PREFERRED_PROXY_PROTOCOL, "true")],
            vec![ServicePort { name: None, protocol: Protocol::Udp, port: 53, node_port: 30053 }],
        );
        let (spec, _) = translate(&svc, &[], &opts(), None).unwrap();
        assert_eq!(spec.listeners[0].protocol, ListenerProtocol::Udp);
    }

    #[test]
    fn unnamed_multiport_service_is_invalid() {
        let svc = service(
            &[],
            vec![
                ServicePort { name: None, protocol: Protocol::Tcp, port: 80, node_port: 30080 },
                ServicePort { name: None, protocol: Protocol::Tcp, port: 443, node_port: 30443 },
            ],
        );
        assert!(translate(&svc, &[], &opts(), None).is_err());
    }

    #[test]
    fn invalid_ipv6_external_address_is_rejected() {
        let svc = service(
            &[(annotations::PREFERRED_EXISTING_EXTERNAL_IP, "::1")],
            two_tcp_ports(),
        );
        assert!(translate(&svc, &[], &opts(), None).is_err());
    }

    #[test]
    fn unsupported_legacy_annotation_emits_single_warning() {
        let svc = service(&[("yawol.stackit.cloud/debug", "1")], two_tcp_ports());
        let (_, warnings) = translate(&svc, &[], &opts(), None).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].reason, "UnsupportedAnnotation");
    }
}
