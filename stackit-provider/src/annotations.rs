//! Legacy-annotation dual sourcing (§4.1, §6, §9 "keep a single precedence
//! table"). Every configurable that has both a preferred `lb.stackit.cloud/*`
//! key and a legacy `yawol.stackit.cloud/*` key is resolved through
//! [`resolve`], never by ad-hoc fallback logic at each call site.

use stackit_common::Error;
use stackit_types::Service;

pub const PREFERRED_INTERNAL_LB: &str = "lb.stackit.cloud/internal-lb";
pub const LEGACY_INTERNAL_LB: &str = "yawol.stackit.cloud/internalLB";

pub const PREFERRED_EXISTING_EXTERNAL_IP: &str = "lb.stackit.cloud/external-address";
pub const LEGACY_EXISTING_EXTERNAL_IP: &str = "yawol.stackit.cloud/externalIP";

pub const PREFERRED_TCP_IDLE_TIMEOUT: &str = "lb.stackit.cloud/tcp-idle-timeout";
pub const LEGACY_TCP_IDLE_TIMEOUT: &str = "yawol.stackit.cloud/tcpIdleTimeout";

pub const PREFERRED_UDP_IDLE_TIMEOUT: &str = "lb.stackit.cloud/udp-idle-timeout";
pub const LEGACY_UDP_IDLE_TIMEOUT: &str = "yawol.stackit.cloud/udpIdleTimeout";

pub const PREFERRED_PROXY_PROTOCOL: &str = "lb.stackit.cloud/tcp-proxy-protocol";
pub const LEGACY_PROXY_PROTOCOL: &str = "yawol.stackit.cloud/tcpProxyProtocol";

pub const PREFERRED_PROXY_PROTOCOL_PORTS_FILTER: &str =
    "lb.stackit.cloud/tcp-proxy-protocol-ports-filter";
pub const LEGACY_PROXY_PROTOCOL_PORTS_FILTER: &str =
    "yawol.stackit.cloud/tcpProxyProtocolPortsFilter";

pub const PREFERRED_SESSION_PERSISTENCE: &str = "lb.stackit.cloud/session-persistence-with-source-ip";

pub const PREFERRED_LISTENER_NETWORK: &str = "lb.stackit.cloud/listener-network";

pub const PREFERRED_PLAN_ID: &str = "lb.stackit.cloud/service-plan-id";
pub const LEGACY_FLAVOR_ID: &str = "yawol.stackit.cloud/flavorId";

pub const LEGACY_ACCESS_CONTROL_SOURCE_RANGES: &str = "yawol.stackit.cloud/sourceRanges";

pub const PREFERRED_IP_MODE_PROXY: &str = "lb.stackit.cloud/ip-mode-proxy";

/// Legacy-only annotations that are acknowledged but otherwise ignored; a
/// single warning event lists whichever of these are present (§4.1
/// "Unsupported-annotation warning").
pub const UNSUPPORTED_LEGACY_ANNOTATIONS: &[&str] = &[
    "yawol.stackit.cloud/debug",
    "yawol.stackit.cloud/debugSSHKey",
    "yawol.stackit.cloud/logForward",
    "yawol.stackit.cloud/additionalNetworks",
];

/// Resolves a `(preferred, legacy)` pair against a service's annotations.
/// Both set and disagreeing is an `InvalidSpec` conflict; both set and equal
/// resolves to that shared value; either alone resolves to it.
pub fn resolve<'a>(
    service: &'a Service,
    preferred_key: &str,
    legacy_key: &str,
) -> Result<Option<&'a str>, Error> {
    match (service.annotation(preferred_key), service.annotation(legacy_key)) {
        (Some(p), Some(l)) if p != l => Err(Error::InvalidSpec(format!(
            "conflicting values for {preferred_key} ({p:?}) and {legacy_key} ({l:?})"
        ))),
        (Some(p), _) => Ok(Some(p)),
        (None, Some(l)) => Ok(Some(l)),
        (None, None) => Ok(None),
    }
}

/// Same as [`resolve`] but for booleans rendered as `"true"`/`"false"`
/// strings, used by `internal-lb`/`tcp-proxy-protocol`.
pub fn resolve_bool(service: &Service, preferred_key: &str, legacy_key: &str) -> Result<Option<bool>, Error> {
    match (service.annotation(preferred_key), service.annotation(legacy_key)) {
        (Some(p), Some(l)) => {
            let pv = p.parse::<bool>().map_err(|_| Error::InvalidSpec(format!("invalid boolean {preferred_key}={p}")))?;
            let lv = l.parse::<bool>().map_err(|_| Error::InvalidSpec(format!("invalid boolean {legacy_key}={l}")))?;
            if pv != lv {
                return Err(Error::InvalidSpec(format!(
                    "conflicting values for {preferred_key} ({p}) and {legacy_key} ({l})"
                )));
            }
            Ok(Some(pv))
        }
        (Some(p), None) => Ok(Some(p.parse::<bool>().map_err(|_| {
            Error::InvalidSpec(format!("invalid boolean {preferred_key}={p}"))
        })?)),
        (None, Some(l)) => Ok(l.parse::<bool>().ok()),
        (None, None) => Ok(None),
    }
}

/// The legacy annotations present on `service` that are in the
/// unsupported/ignored set, in fixed declaration order.
pub fn unsupported_legacy_present(service: &Service) -> Vec<&'static str> {
    UNSUPPORTED_LEGACY_ANNOTATIONS
        .iter()
        .copied()
        .filter(|k| service.annotation(k).is_some())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use stackit_types::ServicePort;

    fn svc(annotations: &[(&str, &str)]) -> Service {
        Service {
            uid: "abcd".into(),
            name: "web".into(),
            namespace: None,
            ports: vec![ServicePort {
                name: None,
                protocol: stackit_types::Protocol::Tcp,
                port: 80,
                node_port: 30080,
            }],
            load_balancer_source_ranges: vec![],
            annotations: annotations.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn preferred_wins_when_only_preferred_set() {
        let s = svc(&[(PREFERRED_TCP_IDLE_TIMEOUT, "30s")]);
        assert_eq!(
            resolve(&s, PREFERRED_TCP_IDLE_TIMEOUT, LEGACY_TCP_IDLE_TIMEOUT).unwrap(),
            Some("30s")
        );
    }

    #[test]
    fn legacy_honored_when_preferred_absent() {
        let s = svc(&[(LEGACY_TCP_IDLE_TIMEOUT, "45s")]);
        assert_eq!(
            resolve(&s, PREFERRED_TCP_IDLE_TIMEOUT, LEGACY_TCP_IDLE_TIMEOUT).unwrap(),
            Some("45s")
        );
    }

    #[test]
    fn conflicting_values_fail() {
        let s = svc(&[(PREFERRED_INTERNAL_LB, "true"), (LEGACY_INTERNAL_LB, "false")]);
        assert!(resolve_bool(&s, PREFERRED_INTERNAL_LB, LEGACY_INTERNAL_LB).is_err());
    }

    #[test]
    fn unsupported_annotations_are_listed() {
        let s = svc(&[("yawol.stackit.cloud/debug", "1")]);
        assert_eq!(unsupported_legacy_present(&s), vec!["yawol.stackit.cloud/debug"]);
    }
}
