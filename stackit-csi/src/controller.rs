//! CSI Controller service (C9). Idempotence is primary: every RPC here must
//! tolerate prior partial work, the way `DeleteVolume`/`delete_backup` in
//! `stackit-client` already swallow 404s. Grounded on `api.rs`'s
//! request-in/response-out tonic shape, generalized from a single service
//! to the nine RPCs §4.4 names.

use std::collections::BTreeMap;
use std::sync::Arc;

use tonic::{Request, Response, Status};

use stackit_client::IaasClient;
use stackit_types::{BackupStatus, SnapshotStatus, VolumeSource, VolumeStatus};

use crate::config::{self, CsiConfig};
use crate::proto::{
    self, ControllerExpandVolumeRequest, ControllerExpandVolumeResponse,
    ControllerGetCapabilitiesRequest, ControllerGetCapabilitiesResponse,
    ControllerPublishVolumeRequest, ControllerPublishVolumeResponse,
    ControllerServiceCapability, ControllerUnpublishVolumeRequest, ControllerUnpublishVolumeResponse,
    CreateSnapshotRequest, CreateSnapshotResponse, CreateVolumeRequest, CreateVolumeResponse,
    DeleteSnapshotRequest, DeleteSnapshotResponse, DeleteVolumeRequest, DeleteVolumeResponse,
    ListSnapshotsRequest, ListSnapshotsResponse, ListVolumesRequest, ListVolumesResponse, Snapshot,
    Topology, Volume,
};
use crate::status::to_status;

const GIB: i64 = 1024 * 1024 * 1024;
const RESIZE_REQUIRED_KEY: &str = "ResizeRequired";

pub struct ControllerService {
    pub client: Arc<dyn IaasClient>,
    pub project_id: String,
    pub config: CsiConfig,
}

impl ControllerService {
    pub fn new(client: Arc<dyn IaasClient>, project_id: impl Into<String>) -> Self {
        Self { client, project_id: project_id.into(), config: CsiConfig::default() }
    }

    fn az_from_request(&self, req: &CreateVolumeRequest) -> Option<String> {
        if let Some(az) = req.parameters.get(config::PARAM_AVAILABILITY_ZONE) {
            return Some(az.clone());
        }
        let topo = req.accessibility_requirements.as_ref()?;
        topo.preferred
            .iter()
            .chain(topo.requisite.iter())
            .find_map(|t| t.segments.get(config::TOPOLOGY_ZONE_KEY).cloned())
    }

    fn volume_response(&self, v: &stackit_types::Volume) -> Volume {
        let mut volume_context = BTreeMap::new();
        if v.source.is_some() {
            volume_context.insert(RESIZE_REQUIRED_KEY.to_string(), "true".to_string());
        }
        Volume {
            capacity_bytes: v.size_gib * GIB,
            volume_id: v.id.clone(),
            volume_context,
            accessible_topology: vec![Topology {
                segments: BTreeMap::from([(config::TOPOLOGY_ZONE_KEY.to_string(), v.availability_zone.clone())]),
            }],
        }
    }

    async fn resolve_source(
        &self,
        req: &CreateVolumeRequest,
        az: &str,
    ) -> Result<Option<VolumeSource>, Status> {
        if !req.source_snapshot_id.is_empty() {
            let snap_id = &req.source_snapshot_id;
            return match self.client.get_snapshot_by_id(&self.project_id, snap_id).await {
                Ok(snap) => {
                    if snap.status != SnapshotStatus::Ready {
                        return Err(Status::internal("source snapshot is not ready"));
                    }
                    self.check_source_az(&snap.source_volume_id, az).await?;
                    Ok(Some(VolumeSource::Snapshot(snap_id.clone())))
                }
                Err(e) if e.is_not_found() => {
                    let backup = self
                        .client
                        .get_backup_by_id(&self.project_id, snap_id)
                        .await
                        .map_err(to_status)?;
                    if backup.status != BackupStatus::Ready {
                        return Err(Status::internal("source backup is not ready"));
                    }
                    self.check_source_az(&backup.source_volume_id, az).await?;
                    Ok(Some(VolumeSource::Snapshot(backup.snapshot_id)))
                }
                Err(e) => Err(to_status(e)),
            };
        }
        if !req.source_volume_id.is_empty() {
            self.check_source_az(&req.source_volume_id, az).await?;
            return Ok(Some(VolumeSource::Volume(req.source_volume_id.clone())));
        }
        Ok(None)
    }

    async fn check_source_az(&self, source_volume_id: &str, desired_az: &str) -> Result<(), Status> {
        let source = self
            .client
            .get_volume(&self.project_id, source_volume_id)
            .await
            .map_err(to_status)?;
        if source.availability_zone != desired_az {
            return Err(Status::resource_exhausted(format!(
                "source volume {source_volume_id} is in zone {} but requested zone is {desired_az}",
                source.availability_zone
            )));
        }
        Ok(())
    }
}

#[tonic::async_trait]
impl proto::controller_server::Controller for ControllerService {
    async fn create_volume(
        &self,
        request: Request<CreateVolumeRequest>,
    ) -> Result<Response<CreateVolumeResponse>, Status> {
        let req = request.into_inner();
        if req.name.is_empty() {
            return Err(Status::invalid_argument("volume name is required"));
        }
        if req.volume_capabilities.len() != 1 {
            return Err(Status::invalid_argument("exactly one volume capability is supported"));
        }
        let size_gib = config::size_gib_from_bytes(req.capacity_range_required_bytes);
        let az = self
            .az_from_request(&req)
            .ok_or_else(|| Status::invalid_argument("no availability zone resolvable from parameters or topology"))?;

        let existing = self
            .client
            .get_volumes_by_name(&self.project_id, &req.name)
            .await
            .map_err(to_status)?;
        match existing.len() {
            0 => {
                let source = self.resolve_source(&req, &az).await?;
                let created = self
                    .client
                    .create_volume(&self.project_id, &req.name, size_gib, &az, source.as_ref())
                    .await
                    .map_err(to_status)?;
                let cancel = tokio_util::sync::CancellationToken::new();
                let ready = self
                    .client
                    .wait_volume_target_status(&self.project_id, &created.id, &[VolumeStatus::Available], None, &cancel)
                    .await
                    .map_err(to_status)?;
                Ok(Response::new(CreateVolumeResponse { volume: Some(self.volume_response(&ready)) }))
            }
            1 => {
                let v = &existing[0];
                if v.size_gib != size_gib {
                    return Err(Status::already_exists(format!(
                        "volume {} exists with size {} GiB, requested {size_gib} GiB",
                        req.name, v.size_gib
                    )));
                }
                if v.status != VolumeStatus::Available {
                    return Err(Status::internal(format!("volume {} exists but is not Available", req.name)));
                }
                Ok(Response::new(CreateVolumeResponse { volume: Some(self.volume_response(v)) }))
            }
            _ => Err(Status::internal(format!("multiple volumes named {} exist", req.name))),
        }
    }

    async fn delete_volume(
        &self,
        request: Request<DeleteVolumeRequest>,
    ) -> Result<Response<DeleteVolumeResponse>, Status> {
        let req = request.into_inner();
        self.client.delete_volume(&self.project_id, &req.volume_id).await.map_err(to_status)?;
        Ok(Response::new(DeleteVolumeResponse {}))
    }

    async fn controller_publish_volume(
        &self,
        request: Request<ControllerPublishVolumeRequest>,
    ) -> Result<Response<ControllerPublishVolumeResponse>, Status> {
        let req = request.into_inner();
        if req.volume_id.is_empty() || req.node_id.is_empty() {
            return Err(Status::invalid_argument("volume_id and node_id are required"));
        }
        if req.volume_capability.is_none() {
            return Err(Status::invalid_argument("volume_capability is required"));
        }
        self.client.get_volume(&self.project_id, &req.volume_id).await.map_err(to_status)?;
        self.client.get_server(&self.project_id, &req.node_id).await.map_err(to_status)?;

        self.client
            .attach_volume(&self.project_id, &req.volume_id, &req.node_id)
            .await
            .map_err(to_status)?;
        let cancel = tokio_util::sync::CancellationToken::new();
        self.client
            .wait_disk_attached(&self.project_id, &req.volume_id, &req.node_id, &cancel)
            .await
            .map_err(to_status)?;
        Ok(Response::new(ControllerPublishVolumeResponse { publish_context: BTreeMap::new() }))
    }

    async fn controller_unpublish_volume(
        &self,
        request: Request<ControllerUnpublishVolumeRequest>,
    ) -> Result<Response<ControllerUnpublishVolumeResponse>, Status> {
        let req = request.into_inner();
        if !req.node_id.is_empty() {
            if let Err(e) = self.client.get_server(&self.project_id, &req.node_id).await {
                if e.is_not_found() {
                    return Ok(Response::new(ControllerUnpublishVolumeResponse {}));
                }
                return Err(to_status(e));
            }
        }
        self.client
            .detach_volume(&self.project_id, &req.volume_id, &req.node_id)
            .await
            .map_err(to_status)?;
        let cancel = tokio_util::sync::CancellationToken::new();
        match self.client.wait_disk_detached(&self.project_id, &req.volume_id, &cancel).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(to_status(e)),
        }
        Ok(Response::new(ControllerUnpublishVolumeResponse {}))
    }

    async fn controller_expand_volume(
        &self,
        request: Request<ControllerExpandVolumeRequest>,
    ) -> Result<Response<ControllerExpandVolumeResponse>, Status> {
        let req = request.into_inner();
        let requested_gib = config::size_gib_from_bytes(req.capacity_range_required_bytes);
        let current = self.client.get_volume(&self.project_id, &req.volume_id).await.map_err(to_status)?;
        if current.size_gib >= requested_gib {
            return Ok(Response::new(ControllerExpandVolumeResponse {
                capacity_bytes: current.size_gib * GIB,
                node_expansion_required: true,
            }));
        }
        self.client
            .expand_volume(&self.project_id, &req.volume_id, requested_gib)
            .await
            .map_err(to_status)?;
        let cancel = tokio_util::sync::CancellationToken::new();
        let expanded = self
            .client
            .wait_volume_target_status(
                &self.project_id,
                &req.volume_id,
                &[VolumeStatus::Available, VolumeStatus::InUse],
                None,
                &cancel,
            )
            .await
            .map_err(to_status)?;
        Ok(Response::new(ControllerExpandVolumeResponse {
            capacity_bytes: expanded.size_gib * GIB,
            node_expansion_required: true,
        }))
    }

    async fn create_snapshot(
        &self,
        request: Request<CreateSnapshotRequest>,
    ) -> Result<Response<CreateSnapshotResponse>, Status> {
        let req = request.into_inner();
        if req.name.is_empty() || req.source_volume_id.is_empty() {
            return Err(Status::invalid_argument("name and source_volume_id are required"));
        }
        let snapshot_type = req
            .parameters
            .get(config::PARAM_SNAPSHOT_TYPE)
            .map(String::as_str)
            .unwrap_or(config::SNAPSHOT_TYPE_SNAPSHOT);

        match snapshot_type {
            config::SNAPSHOT_TYPE_SNAPSHOT => {
                let snap = self.find_or_create_snapshot(&req.name, &req.source_volume_id).await?;
                let cancel = tokio_util::sync::CancellationToken::new();
                let ready = self
                    .client
                    .wait_snapshot_ready(&self.project_id, &snap.id, &cancel)
                    .await
                    .map_err(to_status)?;
                Ok(Response::new(CreateSnapshotResponse { snapshot: Some(snapshot_response(&ready)) }))
            }
            config::SNAPSHOT_TYPE_BACKUP => {
                let existing = self.list_backups_by_name(&req.name).await?;
                if let Some(b) = existing {
                    if b.source_volume_id != req.source_volume_id {
                        return Err(Status::already_exists(format!(
                            "backup {} exists for a different source volume",
                            req.name
                        )));
                    }
                    let refreshed = self.client.get_backup_by_id(&self.project_id, &b.id).await.map_err(to_status)?;
                    return Ok(Response::new(CreateSnapshotResponse { snapshot: Some(backup_as_snapshot(&refreshed)) }));
                }

                let snap = self.find_or_create_snapshot(&req.name, &req.source_volume_id).await?;
                let cancel = tokio_util::sync::CancellationToken::new();
                let ready_snap = self
                    .client
                    .wait_snapshot_ready(&self.project_id, &snap.id, &cancel)
                    .await
                    .map_err(to_status)?;

                let backup = self
                    .client
                    .create_backup(&self.project_id, &req.name, &req.source_volume_id, &ready_snap.id)
                    .await
                    .map_err(to_status)?;
                let total_secs = ready_snap.size_gib as f64 * self.config.backup_max_seconds_per_gb;
                let backup_backoff = stackit_common::Backoff::new(
                    std::time::Duration::from_secs_f64((total_secs / 5.0).max(1.0)),
                    1.0,
                    5,
                );
                let ready_backup = self
                    .client
                    .wait_backup_ready(&self.project_id, &backup.id, Some(&backup_backoff), &cancel)
                    .await
                    .map_err(to_status)?;
                let refreshed = self
                    .client
                    .get_backup_by_id(&self.project_id, &ready_backup.id)
                    .await
                    .map_err(to_status)?;

                if let Err(e) = self.client.delete_snapshot(&self.project_id, &ready_snap.id).await {
                    if !e.is_not_found() {
                        return Err(to_status(e));
                    }
                }
                Ok(Response::new(CreateSnapshotResponse { snapshot: Some(backup_as_snapshot(&refreshed)) }))
            }
            other => Err(Status::invalid_argument(format!("unknown snapshotType {other}"))),
        }
    }

    async fn delete_snapshot(
        &self,
        request: Request<DeleteSnapshotRequest>,
    ) -> Result<Response<DeleteSnapshotResponse>, Status> {
        let req = request.into_inner();
        if let Ok(backup) = self.client.get_backup_by_id(&self.project_id, &req.snapshot_id).await {
            self.client.delete_backup(&self.project_id, &backup.id).await.map_err(to_status)?;
        }
        self.client.delete_snapshot(&self.project_id, &req.snapshot_id).await.map_err(to_status)?;
        Ok(Response::new(DeleteSnapshotResponse {}))
    }

    async fn list_volumes(
        &self,
        _request: Request<ListVolumesRequest>,
    ) -> Result<Response<ListVolumesResponse>, Status> {
        let volumes = self.client.list_volumes(&self.project_id).await.map_err(to_status)?;
        let entries = volumes
            .iter()
            .map(|v| proto::list_volumes_response::Entry { volume: Some(self.volume_response(v)) })
            .collect();
        Ok(Response::new(ListVolumesResponse { entries, next_token: String::new() }))
    }

    async fn list_snapshots(
        &self,
        request: Request<ListSnapshotsRequest>,
    ) -> Result<Response<ListSnapshotsResponse>, Status> {
        let req = request.into_inner();
        let snapshots = self.client.list_snapshots(&self.project_id).await.map_err(to_status)?;
        let entries = snapshots
            .into_iter()
            .filter(|s| {
                if !req.snapshot_id.is_empty() {
                    s.id == req.snapshot_id
                } else if !req.source_volume_id.is_empty() {
                    s.source_volume_id == req.source_volume_id && s.status == SnapshotStatus::Ready
                } else {
                    s.status == SnapshotStatus::Ready
                }
            })
            .map(|s| proto::list_snapshots_response::Entry { snapshot: Some(snapshot_response(&s)) })
            .collect();
        Ok(Response::new(ListSnapshotsResponse { entries, next_token: String::new() }))
    }

    async fn controller_get_capabilities(
        &self,
        _request: Request<ControllerGetCapabilitiesRequest>,
    ) -> Result<Response<ControllerGetCapabilitiesResponse>, Status> {
        use proto::controller_service_capability::{rpc::Type as RpcType, Rpc};
        let rpcs = [
            RpcType::CreateDeleteVolume,
            RpcType::PublishUnpublishVolume,
            RpcType::ExpandVolume,
            RpcType::CreateDeleteSnapshot,
            RpcType::ListVolumes,
            RpcType::ListSnapshots,
        ];
        let capabilities = rpcs
            .into_iter()
            .map(|t| ControllerServiceCapability {
                r#type: Some(proto::controller_service_capability::Type::Rpc(Rpc { r#type: t as i32 })),
            })
            .collect();
        Ok(Response::new(ControllerGetCapabilitiesResponse { capabilities }))
    }
}

impl ControllerService {
    async fn find_or_create_snapshot(
        &self,
        name: &str,
        source_volume_id: &str,
    ) -> Result<stackit_types::Snapshot, Status> {
        let existing: Vec<_> = self
            .client
            .list_snapshots(&self.project_id)
            .await
            .map_err(to_status)?
            .into_iter()
            .filter(|s| s.name == name)
            .collect();
        match existing.len() {
            0 => self
                .client
                .create_snapshot(&self.project_id, name, source_volume_id)
                .await
                .map_err(to_status),
            1 => {
                if existing[0].source_volume_id != source_volume_id {
                    return Err(Status::already_exists(format!("snapshot {name} exists for a different source volume")));
                }
                Ok(existing.into_iter().next().unwrap())
            }
            _ => Err(Status::internal(format!("multiple snapshots named {name} exist"))),
        }
    }

    async fn list_backups_by_name(&self, name: &str) -> Result<Option<stackit_types::Backup>, Status> {
        let mut matches: Vec<_> = self
            .client
            .list_backups(&self.project_id)
            .await
            .map_err(to_status)?
            .into_iter()
            .filter(|b| b.name == name)
            .collect();
        match matches.len() {
            0 => Ok(None),
            1 => Ok(Some(matches.remove(0))),
            _ => Err(Status::internal(format!("multiple backups named {name} exist"))),
        }
    }
}

fn snapshot_response(s: &stackit_types::Snapshot) -> Snapshot {
    Snapshot {
        size_bytes: s.size_gib * GIB,
        snapshot_id: s.id.clone(),
        source_volume_id: s.source_volume_id.clone(),
        creation_time_unix: s.created_at.timestamp(),
        ready_to_use: s.status == SnapshotStatus::Ready,
    }
}

fn backup_as_snapshot(b: &stackit_types::Backup) -> Snapshot {
    Snapshot {
        size_bytes: b.size_gib * GIB,
        snapshot_id: b.id.clone(),
        source_volume_id: b.source_volume_id.clone(),
        creation_time_unix: b.created_at.timestamp(),
        ready_to_use: b.status == BackupStatus::Ready,
    }
}

