//! CSI Node service (C10). Polymorphic over two small capabilities per §4.5:
//! resolving a volume's device path (`MetadataProvider`) and staging/
//! publishing it onto the filesystem (`MountCapability`). The RPC handlers
//! stay thin; the capabilities carry the host-specific behavior, mirroring
//! how `stackit-client`'s adapters keep the transport detail behind a
//! trait rather than in the caller.

use std::collections::BTreeMap;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tonic::{Request, Response, Status};

use stackit_common::Error;

use crate::config::TOPOLOGY_ZONE_KEY;
use crate::proto::{
    self, NodeGetCapabilitiesRequest, NodeGetCapabilitiesResponse, NodeGetInfoRequest,
    NodeGetInfoResponse, NodePublishVolumeRequest, NodePublishVolumeResponse,
    NodeServiceCapability, NodeStageVolumeRequest, NodeStageVolumeResponse,
    NodeUnpublishVolumeRequest, NodeUnpublishVolumeResponse, NodeUnstageVolumeRequest,
    NodeUnstageVolumeResponse, Topology,
};
use crate::status::to_status;

/// Resolves a CSI volume id to the local block device path. The two
/// recognized provider sources are the instance metadata service and the
/// config-drive, named but not elaborated by §4.5.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn device_path_for_volume(&self, volume_id: &str) -> Result<String, Error>;
    fn topology(&self) -> BTreeMap<String, String>;
}

/// Queries the in-VM instance metadata service for the device path backing
/// an attached volume.
pub struct InstanceMetadataServiceProvider {
    pub endpoint: String,
    pub region: String,
    pub zone: String,
    pub client: reqwest::Client,
}

#[async_trait]
impl MetadataProvider for InstanceMetadataServiceProvider {
    async fn device_path_for_volume(&self, volume_id: &str) -> Result<String, Error> {
        let url = format!("{}/volumes/{volume_id}/device", self.endpoint.trim_end_matches('/'));
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Internal(format!("metadata service returned {}", resp.status())));
        }
        Ok(resp.text().await?.trim().to_string())
    }

    fn topology(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("topology.stackit.cloud/region".to_string(), self.region.clone()),
            (TOPOLOGY_ZONE_KEY.to_string(), self.zone.clone()),
        ])
    }
}

/// Reads `/dev/disk/by-id/virtio-{volume_id}`-style config-drive links
/// instead of calling out to the metadata service, for hosts without
/// network access to it.
pub struct ConfigDriveProvider {
    pub device_root: std::path::PathBuf,
    pub region: String,
    pub zone: String,
}

#[async_trait]
impl MetadataProvider for ConfigDriveProvider {
    async fn device_path_for_volume(&self, volume_id: &str) -> Result<String, Error> {
        let path = self.device_root.join(format!("virtio-{volume_id}"));
        tokio::fs::canonicalize(&path)
            .await
            .map(|p| p.to_string_lossy().into_owned())
            .map_err(|e| Error::NotFound(format!("no config-drive device link for {volume_id}: {e}")))
    }

    fn topology(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("topology.stackit.cloud/region".to_string(), self.region.clone()),
            (TOPOLOGY_ZONE_KEY.to_string(), self.zone.clone()),
        ])
    }
}

/// Performs the actual stage/publish filesystem operations. Kept as a
/// trait so tests can substitute a fake that records calls instead of
/// shelling out.
#[async_trait]
pub trait MountCapability: Send + Sync {
    async fn format_if_needed(&self, device_path: &str, fs_type: &str) -> Result<(), Error>;
    async fn mount(&self, source: &str, target: &str, fs_type: &str, flags: &[String]) -> Result<(), Error>;
    async fn bind_mount(&self, source: &str, target: &str, readonly: bool) -> Result<(), Error>;
    async fn unmount(&self, target: &str) -> Result<(), Error>;
}

pub struct OsMount;

#[async_trait]
impl MountCapability for OsMount {
    async fn format_if_needed(&self, device_path: &str, fs_type: &str) -> Result<(), Error> {
        let probe = Command::new("blkid").arg(device_path).stdout(Stdio::null()).status().await;
        if matches!(probe, Ok(status) if status.success()) {
            return Ok(());
        }
        run(Command::new(format!("mkfs.{fs_type}")).arg(device_path)).await
    }

    async fn mount(&self, source: &str, target: &str, fs_type: &str, flags: &[String]) -> Result<(), Error> {
        tokio::fs::create_dir_all(target).await.map_err(|e| Error::Internal(e.to_string()))?;
        let mut cmd = Command::new("mount");
        cmd.arg("-t").arg(fs_type);
        if !flags.is_empty() {
            cmd.arg("-o").arg(flags.join(","));
        }
        cmd.arg(source).arg(target);
        run(&mut cmd).await
    }

    async fn bind_mount(&self, source: &str, target: &str, readonly: bool) -> Result<(), Error> {
        tokio::fs::create_dir_all(target).await.map_err(|e| Error::Internal(e.to_string()))?;
        let mut cmd = Command::new("mount");
        cmd.arg("--bind").arg(source).arg(target);
        run(&mut cmd).await?;
        if readonly {
            run(Command::new("mount").arg("-o").arg("remount,ro,bind").arg(target)).await?;
        }
        Ok(())
    }

    async fn unmount(&self, target: &str) -> Result<(), Error> {
        run(Command::new("umount").arg(target)).await
    }
}

async fn run(cmd: &mut Command) -> Result<(), Error> {
    let output = cmd.output().await.map_err(|e| Error::Internal(format!("{cmd:?}: {e}")))?;
    if !output.status.success() {
        return Err(Error::Internal(format!(
            "{cmd:?} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}

pub struct NodeService {
    pub node_id: String,
    pub metadata: Box<dyn MetadataProvider>,
    pub mount: Box<dyn MountCapability>,
}

fn mount_flags(cap: &Option<proto::VolumeCapability>) -> (String, Vec<String>, bool) {
    let Some(cap) = cap else { return ("ext4".to_string(), Vec::new(), false) };
    let readonly = cap
        .access_mode
        .as_ref()
        .map(|m| m.mode == proto::volume_capability::access_mode::Mode::MultiNodeReaderOnly as i32)
        .unwrap_or(false);
    match &cap.access_type {
        Some(proto::volume_capability::AccessType::Mount(m)) => {
            let fs = if m.fs_type.is_empty() { "ext4".to_string() } else { m.fs_type.clone() };
            (fs, m.mount_flags.clone(), readonly)
        }
        _ => ("ext4".to_string(), Vec::new(), readonly),
    }
}

#[tonic::async_trait]
impl proto::node_server::Node for NodeService {
    async fn node_stage_volume(
        &self,
        request: Request<NodeStageVolumeRequest>,
    ) -> Result<Response<NodeStageVolumeResponse>, Status> {
        let req = request.into_inner();
        if req.volume_id.is_empty() || req.staging_target_path.is_empty() {
            return Err(Status::invalid_argument("volume_id and staging_target_path are required"));
        }
        let device = self.metadata.device_path_for_volume(&req.volume_id).await.map_err(to_status)?;
        let (fs_type, flags, _) = mount_flags(&req.volume_capability);
        self.mount.format_if_needed(&device, &fs_type).await.map_err(to_status)?;
        self.mount
            .mount(&device, &req.staging_target_path, &fs_type, &flags)
            .await
            .map_err(to_status)?;
        Ok(Response::new(NodeStageVolumeResponse {}))
    }

    async fn node_unstage_volume(
        &self,
        request: Request<NodeUnstageVolumeRequest>,
    ) -> Result<Response<NodeUnstageVolumeResponse>, Status> {
        let req = request.into_inner();
        self.mount.unmount(&req.staging_target_path).await.map_err(to_status)?;
        Ok(Response::new(NodeUnstageVolumeResponse {}))
    }

    async fn node_publish_volume(
        &self,
        request: Request<NodePublishVolumeRequest>,
    ) -> Result<Response<NodePublishVolumeResponse>, Status> {
        let req = request.into_inner();
        if req.staging_target_path.is_empty() || req.target_path.is_empty() {
            return Err(Status::invalid_argument("staging_target_path and target_path are required"));
        }
        let (_, _, readonly) = mount_flags(&req.volume_capability);
        self.mount
            .bind_mount(&req.staging_target_path, &req.target_path, req.readonly || readonly)
            .await
            .map_err(to_status)?;
        Ok(Response::new(NodePublishVolumeResponse {}))
    }

    async fn node_unpublish_volume(
        &self,
        request: Request<NodeUnpublishVolumeRequest>,
    ) -> Result<Response<NodeUnpublishVolumeResponse>, Status> {
        let req = request.into_inner();
        self.mount.unmount(&req.target_path).await.map_err(to_status)?;
        Ok(Response::new(NodeUnpublishVolumeResponse {}))
    }

    async fn node_get_capabilities(
        &self,
        _request: Request<NodeGetCapabilitiesRequest>,
    ) -> Result<Response<NodeGetCapabilitiesResponse>, Status> {
        use proto::node_service_capability::{rpc::Type as RpcType, Rpc};
        let capabilities = [RpcType::StageUnstageVolume]
            .into_iter()
            .map(|t| NodeServiceCapability {
                r#type: Some(proto::node_service_capability::Type::Rpc(Rpc { r#type: t as i32 })),
            })
            .collect();
        Ok(Response::new(NodeGetCapabilitiesResponse { capabilities }))
    }

    async fn node_get_info(
        &self,
        _request: Request<NodeGetInfoRequest>,
    ) -> Result<Response<NodeGetInfoResponse>, Status> {
        Ok(Response::new(NodeGetInfoResponse {
            node_id: self.node_id.clone(),
            accessible_topology: Some(Topology { segments: self.metadata.topology() }),
        }))
    }
}
