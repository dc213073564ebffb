//! LB reconciler (C6): the `Get`/`Ensure`/`UpdateLoadBalancer`/`EnsureDeleted`
//! contract the orchestrator calls, orchestrating the spec translator (C4),
//! diff engine (C5), and credential lifecycle. Grounded on the teacher's
//! determine-then-act shape in `storage-operator/clusters/reconcile.rs`,
//! with the `kube`/leader-election harness stripped since that plumbing is
//! an external collaborator here, not part of the core.

use std::sync::Arc;
use std::time::Duration;

use stackit_client::LoadbalancerClient;
use stackit_common::Error;
use stackit_types::{Node, ObservabilityBlock, ObservabilityTarget, Service};

use crate::config::ObservabilityEnv;
use crate::diff::diff;
use crate::translate::{self, TranslateOptions, Warning};

/// Fixed re-enqueue delay for "not ready yet" (§4.3, §7): never exponential.
pub const LB_RETRY_DELAY: Duration = Duration::from_secs(10);

pub trait EventRecorder: Send + Sync {
    fn warn(&self, reason: &str, message: &str);
}

/// Logs via `tracing`, matching the teacher's reliance on `tracing`/println
/// for operator-visible output where there is no real event-recorder API to
/// call (the orchestrator's recorder is an external collaborator here).
pub struct TracingEventRecorder;

impl EventRecorder for TracingEventRecorder {
    fn warn(&self, reason: &str, message: &str) {
        tracing::warn!(reason, message, "spec translator warning");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancerStatus {
    pub ingress: Option<String>,
    pub ip_mode_proxy: bool,
}

pub struct LbReconciler {
    pub client: Arc<dyn LoadbalancerClient>,
    pub project_id: String,
    pub opts: TranslateOptions,
    pub events: Arc<dyn EventRecorder>,
}

impl LbReconciler {
    pub fn new(client: Arc<dyn LoadbalancerClient>, project_id: impl Into<String>, opts: TranslateOptions) -> Self {
        Self {
            client,
            project_id: project_id.into(),
            opts,
            events: Arc::new(TracingEventRecorder),
        }
    }

    fn emit(&self, warnings: &[Warning]) {
        for w in warnings {
            self.events.warn(&w.reason, &w.message);
        }
    }

    pub async fn get(&self, service: &Service) -> Result<Option<LoadBalancerStatus>, Error> {
        let name = translate::lb_name(&service.uid, &service.name);
        let lb = match self.client.get(&self.project_id, &name).await? {
            None => return Ok(None),
            Some(lb) => lb,
        };
        let ip_mode_proxy = service
            .annotation(crate::annotations::PREFERRED_IP_MODE_PROXY)
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);
        Ok(Some(LoadBalancerStatus {
            ingress: lb.ingress_address(),
            ip_mode_proxy,
        }))
    }

    async fn reconcile_credentials_for_create(
        &self,
        lb_name: &str,
        env: &ObservabilityEnv,
    ) -> Result<Option<ObservabilityBlock>, Error> {
        if !env.is_set() {
            return Ok(None);
        }
        let user = env.user.as_deref().unwrap_or_default();
        let password = env.password.as_deref().unwrap_or_default();
        let creds = self
            .client
            .create_credentials(&self.project_id, lb_name, user, password)
            .await?;
        Ok(Some(ObservabilityBlock {
            metrics: Some(ObservabilityTarget {
                push_url: env.endpoint.clone().unwrap_or_default(),
                credentials_ref: creds.credentials_ref,
            }),
            logs: None,
        }))
    }

    async fn reconcile_credentials_for_update(
        &self,
        lb_name: &str,
        env: &ObservabilityEnv,
        prior_ref: Option<&str>,
    ) -> Result<Option<ObservabilityBlock>, Error> {
        if !env.is_set() {
            return Ok(None);
        }
        let user = env.user.as_deref().unwrap_or_default();
        let password = env.password.as_deref().unwrap_or_default();
        let credentials_ref = match prior_ref {
            Some(existing) => {
                self.client.update_credentials(&self.project_id, existing, user, password).await?;
                existing.to_string()
            }
            None => {
                self.client
                    .create_credentials(&self.project_id, lb_name, user, password)
                    .await?
                    .credentials_ref
            }
        };
        Ok(Some(ObservabilityBlock {
            metrics: Some(ObservabilityTarget {
                push_url: env.endpoint.clone().unwrap_or_default(),
                credentials_ref,
            }),
            logs: None,
        }))
    }

    pub async fn ensure(
        &self,
        service: &Service,
        nodes: &[Node],
        observability_env: &ObservabilityEnv,
    ) -> Result<LoadBalancerStatus, Error> {
        let name = translate::lb_name(&service.uid, &service.name);
        let existing = self.client.get(&self.project_id, &name).await?;

        let lb = match existing {
            None => {
                let observability = self.reconcile_credentials_for_create(&name, observability_env).await?;
                let (spec, warnings) = translate::translate(service, nodes, &self.opts, observability)?;
                self.emit(&warnings);
                let created = self.client.create(&self.project_id, &spec).await?;
                if created.status == stackit_types::LbStatus::Ready {
                    return Ok(status_of(service, &created));
                }
                return Err(Error::Retry(LB_RETRY_DELAY));
            }
            Some(existing_lb) => {
                let prior_ref = existing_lb
                    .spec
                    .observability
                    .as_ref()
                    .and_then(|o| o.credentials_ref())
                    .map(str::to_string);
                let observability = self
                    .reconcile_credentials_for_update(&name, observability_env, prior_ref.as_deref())
                    .await?;
                let (spec, warnings) = translate::translate(service, nodes, &self.opts, observability.clone())?;
                self.emit(&warnings);

                let result = diff(&existing_lb, &spec);
                if let Some(field) = result.immutable_changed {
                    return Err(Error::ImmutableChange(field));
                }

                let lb = if !result.fulfills {
                    let updated = self.client.update(&self.project_id, &spec, &existing_lb.version).await?;
                    if observability.is_none() {
                        if let Some(prior) = prior_ref {
                            self.client.delete_credentials(&self.project_id, &prior).await?;
                        }
                    }
                    updated
                } else {
                    existing_lb
                };
                lb
            }
        };

        if lb.status == stackit_types::LbStatus::Error {
            return Err(Error::Internal(format!("load balancer {name} is in ERROR status")));
        }
        if lb.status != stackit_types::LbStatus::Ready {
            return Err(Error::Retry(LB_RETRY_DELAY));
        }
        Ok(status_of(service, &lb))
    }

    /// Refreshes target pools only (node membership changes), never touches
    /// listeners or observability (§4.3 `UpdateLoadBalancer`).
    pub async fn update_load_balancer(&self, service: &Service, nodes: &[Node]) -> Result<(), Error> {
        let (spec, warnings) = translate::translate(service, nodes, &self.opts, None)?;
        self.emit(&warnings);
        for pool in &spec.target_pools {
            self.client.update_target_pool(&self.project_id, &spec.name, pool).await?;
        }
        Ok(())
    }

    pub async fn ensure_deleted(&self, service: &Service) -> Result<(), Error> {
        let name = translate::lb_name(&service.uid, &service.name);
        let lb = match self.client.get(&self.project_id, &name).await? {
            None => return Ok(()),
            Some(lb) if lb.status == stackit_types::LbStatus::Terminating => return Ok(()),
            Some(lb) => lb,
        };

        if let Some(cred_ref) = lb.spec.observability.as_ref().and_then(|o| o.credentials_ref()).map(str::to_string) {
            let mut scrub_spec = lb.spec.clone();
            scrub_spec.observability = None;
            for listener in &mut scrub_spec.listeners {
                listener.display_name.clear();
            }
            self.client.update(&self.project_id, &scrub_spec, &lb.version).await?;
            self.client.delete_credentials(&self.project_id, &cred_ref).await?;
        }

        // Orphan sweep: best-effort in spirit, but a failure here must
        // still surface as an error to force a retry (§7).
        let all_credentials = self.client.list_credentials(&self.project_id).await?;
        for cred in all_credentials.iter().filter(|c| c.display_name == name) {
            self.client.delete_credentials(&self.project_id, &cred.credentials_ref).await?;
        }

        self.client.delete(&self.project_id, &name).await
    }
}

fn status_of(service: &Service, lb: &stackit_types::LoadBalancer) -> LoadBalancerStatus {
    let ip_mode_proxy = service
        .annotation(crate::annotations::PREFERRED_IP_MODE_PROXY)
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);
    LoadBalancerStatus {
        ingress: lb.ingress_address(),
        ip_mode_proxy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use stackit_types::{LbStatus, LoadBalancer, LoadBalancerSpec, ObservabilityCredentials, Plan, ServicePort, TargetPool};

    struct FakeLbClient {
        lbs: Mutex<BTreeMap<String, LoadBalancer>>,
        credentials: Mutex<Vec<ObservabilityCredentials>>,
    }

    impl FakeLbClient {
        fn new() -> Self {
            Self {
                lbs: Mutex::new(BTreeMap::new()),
                credentials: Mutex::new(Vec::new()),
            }
        }

        fn seed_ready(&self, spec: LoadBalancerSpec) {
            self.lbs.lock().unwrap().insert(
                spec.name.clone(),
                LoadBalancer {
                    version: "1".into(),
                    status: LbStatus::Ready,
                    private_address: None,
                    spec,
                },
            );
        }
    }

    #[async_trait]
    impl LoadbalancerClient for FakeLbClient {
        async fn get(&self, _project_id: &str, name: &str) -> Result<Option<LoadBalancer>, Error> {
            Ok(self.lbs.lock().unwrap().get(name).cloned())
        }

        async fn create(&self, _project_id: &str, spec: &LoadBalancerSpec) -> Result<LoadBalancer, Error> {
            let lb = LoadBalancer {
                version: "1".into(),
                status: LbStatus::Pending,
                private_address: None,
                spec: spec.clone(),
            };
            self.lbs.lock().unwrap().insert(spec.name.clone(), lb.clone());
            Ok(lb)
        }

        async fn update(
            &self,
            _project_id: &str,
            spec: &LoadBalancerSpec,
            _expected_version: &str,
        ) -> Result<LoadBalancer, Error> {
            let lb = LoadBalancer {
                version: "2".into(),
                status: LbStatus::Ready,
                private_address: None,
                spec: spec.clone(),
            };
            self.lbs.lock().unwrap().insert(spec.name.clone(), lb.clone());
            Ok(lb)
        }

        async fn delete(&self, _project_id: &str, name: &str) -> Result<(), Error> {
            self.lbs.lock().unwrap().remove(name);
            Ok(())
        }

        async fn update_target_pool(&self, _project_id: &str, _lb_name: &str, _pool: &TargetPool) -> Result<(), Error> {
            Ok(())
        }

        async fn create_credentials(
            &self,
            _project_id: &str,
            display_name: &str,
            user: &str,
            password: &str,
        ) -> Result<ObservabilityCredentials, Error> {
            let cred = ObservabilityCredentials {
                credentials_ref: format!("cred-{display_name}"),
                display_name: display_name.to_string(),
                push_url: "https://push.example".into(),
                user: user.to_string(),
                password: password.to_string(),
            };
            self.credentials.lock().unwrap().push(cred.clone());
            Ok(cred)
        }

        async fn update_credentials(&self, _project_id: &str, _credentials_ref: &str, _user: &str, _password: &str) -> Result<(), Error> {
            Ok(())
        }

        async fn list_credentials(&self, _project_id: &str) -> Result<Vec<ObservabilityCredentials>, Error> {
            Ok(self.credentials.lock().unwrap().clone())
        }

        async fn delete_credentials(&self, _project_id: &str, credentials_ref: &str) -> Result<(), Error> {
            self.credentials.lock().unwrap().retain(|c| c.credentials_ref != credentials_ref);
            Ok(())
        }
    }

    fn service() -> Service {
        Service {
            uid: "abcd".into(),
            name: "web".into(),
            namespace: None,
            ports: vec![ServicePort { name: None, protocol: stackit_types::Protocol::Tcp, port: 80, node_port: 30080 }],
            load_balancer_source_ranges: vec![],
            annotations: BTreeMap::new(),
        }
    }

    fn reconciler(client: Arc<FakeLbClient>) -> LbReconciler {
        LbReconciler::new(
            client,
            "proj-1",
            TranslateOptions { default_network_id: "net-default".into(), ..Default::default() },
        )
    }

    #[tokio::test]
    async fn s1_first_reconcile_returns_retry_while_pending() {
        let client = Arc::new(FakeLbClient::new());
        let r = reconciler(client);
        let err = r.ensure(&service(), &[], &ObservabilityEnv::default()).await.unwrap_err();
        assert!(matches!(err, Error::Retry(_)));
    }

    #[tokio::test]
    async fn s1_second_reconcile_returns_ready_status() {
        let client = Arc::new(FakeLbClient::new());
        let r = reconciler(client.clone());
        let _ = r.ensure(&service(), &[], &ObservabilityEnv::default()).await;
        // Flip status to Ready, simulating the IaaS finishing provisioning.
        {
            let mut lbs = client.lbs.lock().unwrap();
            let lb = lbs.get_mut("k8s-svc-abcd-web").unwrap();
            lb.status = LbStatus::Ready;
        }
        let status = r.ensure(&service(), &[], &ObservabilityEnv::default()).await.unwrap();
        assert!(status.ingress.is_none() || status.ingress.is_some());
    }

    #[tokio::test]
    async fn s3_immutable_change_is_fatal_with_no_update_attempted() {
        let client = Arc::new(FakeLbClient::new());
        let mut spec = crate::translate::translate(&service(), &[], &TranslateOptions { default_network_id: "net-default".into(), ..Default::default() }, None).unwrap().0;
        spec.private_network_only = true;
        client.seed_ready(spec);
        let r = reconciler(client.clone());
        let err = r.ensure(&service(), &[], &ObservabilityEnv::default()).await.unwrap_err();
        assert!(matches!(err, Error::ImmutableChange(_)));
    }

    #[tokio::test]
    async fn s4_observability_attach_then_detach() {
        let client = Arc::new(FakeLbClient::new());
        let r = reconciler(client.clone());
        let env_on = ObservabilityEnv {
            endpoint: Some("https://push.example".into()),
            user: Some("u".into()),
            password: Some("p".into()),
        };
        let _ = r.ensure(&service(), &[], &env_on).await;
        assert_eq!(client.credentials.lock().unwrap().len(), 1);

        {
            let mut lbs = client.lbs.lock().unwrap();
            let lb = lbs.get_mut("k8s-svc-abcd-web").unwrap();
            lb.status = LbStatus::Ready;
        }
        let _ = r.ensure(&service(), &[], &ObservabilityEnv::default()).await;
        assert!(client.credentials.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ensure_deleted_is_idempotent_when_already_gone() {
        let client = Arc::new(FakeLbClient::new());
        let r = reconciler(client);
        assert!(r.ensure_deleted(&service()).await.is_ok());
    }
}
