//! Config file (YAML) and environment variables (§6). Loaded once at
//! startup and passed down read-only, never re-read mid-reconcile, keeping
//! the core pure/testable — mirrors the teacher's `ServerArgs`/env pattern
//! (`storage/src/args.rs`) but for a YAML-first config surface.

use serde::Deserialize;
use stackit_common::Error;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    pub project_id: String,
    pub region: String,
    #[serde(default)]
    pub network_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerConfig {
    #[serde(default = "default_lb_api")]
    pub api: String,
    #[serde(default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub extra_labels: std::collections::BTreeMap<String, String>,
}

fn default_lb_api() -> String {
    "https://load-balancer.api.stackit.cloud".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataConfig {
    #[serde(default)]
    pub search_order: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstancesConfig {
    #[serde(default = "default_instances_api")]
    pub api: String,
}

fn default_instances_api() -> String {
    "https://iaas.api.stackit.cloud".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub global: GlobalConfig,
    #[serde(default)]
    pub load_balancer: LoadBalancerConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub instances: InstancesConfig,
}

impl ProviderConfig {
    pub fn from_yaml(raw: &str) -> Result<Self, Error> {
        let cfg: ProviderConfig = serde_yaml::from_str(raw)?;
        if cfg.global.project_id.is_empty() {
            return Err(Error::InvalidSpec("global.projectId is required".into()));
        }
        if cfg.global.region.is_empty() {
            return Err(Error::InvalidSpec("global.region is required".into()));
        }
        if cfg.network_id().is_none() {
            return Err(Error::InvalidSpec(
                "a network id is required (global.networkId or loadBalancer.networkId)".into(),
            ));
        }
        Ok(cfg)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Internal(format!("failed to read config file {}: {e}", path.display())))?;
        Self::from_yaml(&raw)
    }

    /// `networkId` is accepted under either `global` (legacy layout) or
    /// `loadBalancer` (newer layout); the latter takes precedence.
    pub fn network_id(&self) -> Option<&str> {
        self.load_balancer
            .network_id
            .as_deref()
            .or(self.global.network_id.as_deref())
    }
}

/// `STACKIT_REMOTEWRITE_*`: must be all-empty or all-set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservabilityEnv {
    pub endpoint: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl ObservabilityEnv {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_values(
            std::env::var("STACKIT_REMOTEWRITE_ENDPOINT").ok(),
            std::env::var("STACKIT_REMOTEWRITE_USER").ok(),
            std::env::var("STACKIT_REMOTEWRITE_PASSWORD").ok(),
        )
    }

    pub fn from_values(
        endpoint: Option<String>,
        user: Option<String>,
        password: Option<String>,
    ) -> Result<Self, Error> {
        let set = [&endpoint, &user, &password].iter().filter(|v| v.is_some()).count();
        if set != 0 && set != 3 {
            return Err(Error::InvalidSpec(
                "STACKIT_REMOTEWRITE_ENDPOINT/USER/PASSWORD must be all-set or all-empty".into(),
            ));
        }
        Ok(Self { endpoint, user, password })
    }

    pub fn is_set(&self) -> bool {
        self.endpoint.is_some()
    }
}

/// `OS_CCM_REGIONAL`: legacy switch for provider-ID formatting, read once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionalityFlag(pub bool);

impl RegionalityFlag {
    pub fn from_env() -> Self {
        Self(
            std::env::var("OS_CCM_REGIONAL")
                .ok()
                .and_then(|v| v.parse::<bool>().ok())
                .unwrap_or(false),
        )
    }
}

/// §9 open question: the stopping sentinel is exposed as a config value
/// rather than a hardcoded string constant so it can be tuned without a
/// code change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoppingSentinel(pub String);

impl Default for StoppingSentinel {
    fn default() -> Self {
        Self("STOPPING".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_required_fields() {
        assert!(ProviderConfig::from_yaml("global:\n  region: eu01\n").is_err());
    }

    #[test]
    fn accepts_network_id_under_either_layout() {
        let cfg = ProviderConfig::from_yaml(
            "global:\n  projectId: p1\n  region: eu01\nloadBalancer:\n  networkId: net-1\n",
        )
        .unwrap();
        assert_eq!(cfg.network_id(), Some("net-1"));

        let cfg2 = ProviderConfig::from_yaml(
            "global:\n  projectId: p1\n  region: eu01\n  networkId: net-legacy\n",
        )
        .unwrap();
        assert_eq!(cfg2.network_id(), Some("net-legacy"));
    }

    #[test]
    fn tolerates_unknown_keys() {
        let cfg = ProviderConfig::from_yaml(
            "global:\n  projectId: p1\n  region: eu01\n  networkId: net-1\nsomeFutureKey: 42\n",
        )
        .unwrap();
        assert_eq!(cfg.global.project_id, "p1");
    }

    #[test]
    fn observability_env_rejects_partial_set() {
        assert!(ObservabilityEnv::from_values(Some("x".into()), None, None).is_err());
        assert!(ObservabilityEnv::from_values(None, None, None).unwrap() == ObservabilityEnv::default());
    }
}
