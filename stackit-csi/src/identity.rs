//! CSI Identity service: plugin metadata and the readiness probe the
//! orchestrator's health-checking sidecar polls.

use tonic::{Request, Response, Status};

use crate::proto::{
    self, GetPluginCapabilitiesRequest, GetPluginCapabilitiesResponse, GetPluginInfoRequest,
    GetPluginInfoResponse, PluginCapability, ProbeRequest, ProbeResponse,
};

pub struct IdentityService {
    pub name: String,
    pub version: String,
}

impl Default for IdentityService {
    fn default() -> Self {
        Self { name: "block.csi.stackit.cloud".to_string(), version: env!("CARGO_PKG_VERSION").to_string() }
    }
}

#[tonic::async_trait]
impl proto::identity_server::Identity for IdentityService {
    async fn get_plugin_info(
        &self,
        _request: Request<GetPluginInfoRequest>,
    ) -> Result<Response<GetPluginInfoResponse>, Status> {
        Ok(Response::new(GetPluginInfoResponse {
            name: self.name.clone(),
            vendor_version: self.version.clone(),
        }))
    }

    async fn get_plugin_capabilities(
        &self,
        _request: Request<GetPluginCapabilitiesRequest>,
    ) -> Result<Response<GetPluginCapabilitiesResponse>, Status> {
        use proto::plugin_capability::{service::Type as ServiceType, Service};
        Ok(Response::new(GetPluginCapabilitiesResponse {
            capabilities: vec![PluginCapability {
                r#type: Some(proto::plugin_capability::Type::Service(Service {
                    r#type: ServiceType::ControllerService as i32,
                })),
            }],
        }))
    }

    async fn probe(&self, _request: Request<ProbeRequest>) -> Result<Response<ProbeResponse>, Status> {
        Ok(Response::new(ProbeResponse { ready: true }))
    }
}
