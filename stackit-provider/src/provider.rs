//! Provider registration (C8): wires the LB reconciler and instances
//! adapter behind the small `CloudProvider` contract the orchestrator's
//! controller-manager harness calls into. Grounded on the teacher's
//! `storage/src/lib.rs` module-wiring style — a thin composition root, no
//! logic of its own.

use async_trait::async_trait;
use stackit_common::Error;
use stackit_types::{Node, Service};

use crate::instances::NodeMetadata;
use crate::reconcile::LoadBalancerStatus;

/// The four-operation contract described in §4.3, as consumed by the
/// orchestrator harness (out of scope here; only the interface is modeled).
#[async_trait]
pub trait LoadBalancer: Send + Sync {
    async fn get_load_balancer(&self, service: &Service) -> Result<Option<LoadBalancerStatus>, Error>;
    async fn ensure_load_balancer(
        &self,
        service: &Service,
        nodes: &[Node],
    ) -> Result<LoadBalancerStatus, Error>;
    async fn update_load_balancer(&self, service: &Service, nodes: &[Node]) -> Result<(), Error>;
    async fn ensure_load_balancer_deleted(&self, service: &Service) -> Result<(), Error>;
}

#[async_trait]
pub trait Instances: Send + Sync {
    async fn instance_metadata(&self, node: &Node) -> Result<NodeMetadata, Error>;
    async fn instance_shutdown(&self, node: &Node) -> Result<bool, Error>;
}

/// Top-level `CloudProvider`: the single object the harness resolves
/// `LoadBalancer()` and `Instances()` from.
pub trait CloudProvider: Send + Sync {
    fn load_balancer(&self) -> &dyn LoadBalancer;
    fn instances(&self) -> &dyn Instances;
}

#[async_trait]
impl Instances for crate::instances::Instances {
    async fn instance_metadata(&self, node: &Node) -> Result<NodeMetadata, Error> {
        let server = self.resolve_server(node).await?;
        Ok(self.instance_metadata(&server))
    }

    async fn instance_shutdown(&self, node: &Node) -> Result<bool, Error> {
        let server = self.resolve_server(node).await?;
        Ok(self.instance_shutdown(&server))
    }
}

#[async_trait]
impl LoadBalancer for crate::reconcile::LbReconciler {
    async fn get_load_balancer(&self, service: &Service) -> Result<Option<LoadBalancerStatus>, Error> {
        self.get(service).await
    }

    async fn ensure_load_balancer(&self, service: &Service, nodes: &[Node]) -> Result<LoadBalancerStatus, Error> {
        let env = crate::config::ObservabilityEnv::from_env()?;
        self.ensure(service, nodes, &env).await
    }

    async fn update_load_balancer(&self, service: &Service, nodes: &[Node]) -> Result<(), Error> {
        crate::reconcile::LbReconciler::update_load_balancer(self, service, nodes).await
    }

    async fn ensure_load_balancer_deleted(&self, service: &Service) -> Result<(), Error> {
        self.ensure_deleted(service).await
    }
}

/// Composition root: the concrete `CloudProvider` the `ccm` binary builds
/// at startup from the configured HTTP clients.
pub struct StackitProvider {
    pub lb: crate::reconcile::LbReconciler,
    pub instances: crate::instances::Instances,
}

impl CloudProvider for StackitProvider {
    fn load_balancer(&self) -> &dyn LoadBalancer {
        &self.lb
    }

    fn instances(&self) -> &dyn Instances {
        &self.instances
    }
}
