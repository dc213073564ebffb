//! LB diff engine (C5): `(observed, desired) -> (fulfills, immutable_changed)`.
//! Diff as data, not control flow (§9): callers branch on the result rather
//! than catching an exception. Grounded on the teacher's `topology_diff`
//! generalized from a single set-diff to a full multi-field comparison.

use stackit_types::{LoadBalancer, LoadBalancerSpec};

use crate::compare::unordered_eq;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffResult {
    pub fulfills: bool,
    pub immutable_changed: Option<String>,
}

impl DiffResult {
    fn fulfilled() -> Self {
        Self {
            fulfills: true,
            immutable_changed: None,
        }
    }
}

/// Scans the *entire* object before returning, so a mutable difference
/// elsewhere never hides an immutable one (§4.2).
pub fn diff(observed: &LoadBalancer, desired: &LoadBalancerSpec) -> DiffResult {
    let mut immutable_changed: Option<String> = None;
    let mut fulfills = true;

    if observed.spec.private_network_only != desired.private_network_only {
        immutable_changed.get_or_insert("privateNetworkOnly".to_string());
    }

    if observed.spec.networks.len() != desired.networks.len() {
        immutable_changed.get_or_insert("networks".to_string());
    } else {
        for (i, (o, d)) in observed.spec.networks.iter().zip(desired.networks.iter()).enumerate() {
            if o.network_id != d.network_id {
                immutable_changed.get_or_insert(format!("networks[{i}].networkId"));
            }
            if o.role != d.role {
                immutable_changed.get_or_insert(format!("networks[{i}].role"));
            }
        }
    }

    // The IaaS assigns the ephemeral address, so while a load balancer
    // stays ephemeral its observed address is never compared against
    // desired (which carries `external_address: None` for a plain
    // ephemeral LB). Static -> ephemeral demotion is immutable;
    // ephemeral -> static promotion is a mutable difference.
    match (observed.spec.ephemeral_address, desired.ephemeral_address) {
        (false, true) => {
            immutable_changed.get_or_insert(".externalAddress".to_string());
        }
        (true, false) => {
            fulfills = false;
        }
        (false, false) if observed.spec.external_address != desired.external_address => {
            fulfills = false;
        }
        _ => {}
    }

    if immutable_changed.is_some() {
        return DiffResult {
            fulfills: false,
            immutable_changed,
        };
    }

    if !observability_eq(&observed.spec.observability, &desired.observability) {
        fulfills = false;
    }

    if observed.spec.listeners.len() != desired.listeners.len() {
        fulfills = false;
    } else {
        for (o, d) in observed.spec.listeners.iter().zip(desired.listeners.iter()) {
            if o.display_name != d.display_name
                || o.port != d.port
                || o.protocol != d.protocol
                || o.target_pool != d.target_pool
                || o.idle_timeout_seconds != d.idle_timeout_seconds
            {
                fulfills = false;
                break;
            }
        }
    }

    if observed.spec.target_pools.len() != desired.target_pools.len() {
        fulfills = false;
    } else {
        for (o, d) in observed.spec.target_pools.iter().zip(desired.target_pools.iter()) {
            if o.name != d.name
                || o.target_port != d.target_port
                || o.session_persistence != d.session_persistence
                || o.active_health_check != d.active_health_check
                || !unordered_eq(&o.targets, &d.targets)
            {
                fulfills = false;
                break;
            }
        }
    }

    if observed.spec.plan_id != desired.plan_id {
        fulfills = false;
    }

    if observed.spec.access_control_source_ranges != desired.access_control_source_ranges {
        fulfills = false;
    }

    if observed.spec.extra_labels != desired.extra_labels {
        fulfills = false;
    }

    if fulfills {
        DiffResult::fulfilled()
    } else {
        DiffResult {
            fulfills: false,
            immutable_changed: None,
        }
    }
}

fn observability_eq(
    a: &Option<stackit_types::ObservabilityBlock>,
    b: &Option<stackit_types::ObservabilityBlock>,
) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.metrics == b.metrics && a.logs == b.logs,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use stackit_types::{LbStatus, Listener, ListenerProtocol, Network, NetworkRole, Plan, TargetPool};

    fn base_spec() -> LoadBalancerSpec {
        LoadBalancerSpec {
            name: "k8s-svc-abcd-web".into(),
            private_network_only: false,
            external_address: None,
            ephemeral_address: true,
            plan_id: Plan::P10,
            networks: vec![Network { network_id: "net-default".into(), role: NetworkRole::ListenersAndTargets }],
            listeners: vec![Listener {
                display_name: "http".into(),
                port: 80,
                target_pool: "http".into(),
                protocol: ListenerProtocol::Tcp,
                idle_timeout_seconds: Some("3600".into()),
            }],
            target_pools: vec![TargetPool {
                name: "http".into(),
                target_port: 30080,
                targets: vec![],
                session_persistence: false,
                active_health_check: None,
            }],
            access_control_source_ranges: vec![],
            observability: None,
            extra_labels: std::collections::BTreeMap::new(),
        }
    }

    fn observed_from(spec: LoadBalancerSpec) -> LoadBalancer {
        LoadBalancer {
            version: "1".into(),
            status: LbStatus::Ready,
            private_address: None,
            spec,
        }
    }

    #[test]
    fn invariant3_idle_timeout_only_difference_is_mutable_not_immutable() {
        let observed = observed_from(base_spec());
        let mut desired = base_spec();
        desired.listeners[0].idle_timeout_seconds = Some("60".into());
        let result = diff(&observed, &desired);
        assert!(!result.fulfills);
        assert!(result.immutable_changed.is_none());
    }

    #[test]
    fn invariant4_network_id_change_is_immutable() {
        let observed = observed_from(base_spec());
        let mut desired = base_spec();
        desired.networks[0].network_id = "net-other".into();
        let result = diff(&observed, &desired);
        assert!(result.immutable_changed.is_some());
    }

    #[test]
    fn steady_state_ephemeral_lb_ignores_iaas_assigned_address() {
        let mut observed_spec = base_spec();
        observed_spec.external_address = Some(Ipv4Addr::new(5, 6, 7, 8));
        let observed = observed_from(observed_spec);
        let result = diff(&observed, &base_spec());
        assert!(result.fulfills);
        assert!(result.immutable_changed.is_none());
    }

    #[test]
    fn invariant5_ephemeral_to_static_promotion_is_mutable() {
        let observed = observed_from(base_spec());
        let mut desired = base_spec();
        desired.external_address = Some(Ipv4Addr::new(1, 2, 3, 4));
        desired.ephemeral_address = false;
        let result = diff(&observed, &desired);
        assert!(!result.fulfills);
        assert!(result.immutable_changed.is_none());
    }

    #[test]
    fn invariant5_static_to_ephemeral_demotion_is_immutable() {
        let mut observed_spec = base_spec();
        observed_spec.external_address = Some(Ipv4Addr::new(1, 2, 3, 4));
        observed_spec.ephemeral_address = false;
        let observed = observed_from(observed_spec);
        let mut desired = base_spec();
        desired.external_address = None;
        desired.ephemeral_address = true;
        let result = diff(&observed, &desired);
        assert!(result.immutable_changed.is_some());
    }

    #[test]
    fn immutable_change_wins_even_with_a_mutable_difference_present() {
        let observed = observed_from(base_spec());
        let mut desired = base_spec();
        desired.networks[0].network_id = "net-other".into();
        desired.plan_id = Plan::P50;
        let result = diff(&observed, &desired);
        assert!(result.immutable_changed.is_some());
        assert!(!result.fulfills);
    }

    #[test]
    fn identical_spec_fulfills() {
        let observed = observed_from(base_spec());
        let result = diff(&observed, &base_spec());
        assert!(result.fulfills);
        assert!(result.immutable_changed.is_none());
    }

    #[test]
    fn target_pool_targets_compared_unordered() {
        use stackit_types::Target;
        let mut observed_spec = base_spec();
        observed_spec.target_pools[0].targets = vec![
            Target { display_name: "a".into(), ip: "10.0.0.1".into() },
            Target { display_name: "b".into(), ip: "10.0.0.2".into() },
        ];
        let observed = observed_from(observed_spec);
        let mut desired = base_spec();
        desired.target_pools[0].targets = vec![
            Target { display_name: "b".into(), ip: "10.0.0.2".into() },
            Target { display_name: "a".into(), ip: "10.0.0.1".into() },
        ];
        assert!(diff(&observed, &desired).fulfills);
    }
}
