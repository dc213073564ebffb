use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tonic::Request;

use stackit_client::{IaasClient, NodeClient};
use stackit_common::Error;
use stackit_types::{Backup, BackupStatus, Server, Snapshot, SnapshotStatus, Volume, VolumeStatus};

use stackit_csi::controller::ControllerService;
use stackit_csi::proto::controller_server::Controller;
use stackit_csi::proto::{CreateSnapshotRequest, CreateVolumeRequest, DeleteSnapshotRequest, DeleteVolumeRequest, VolumeCapability};

#[derive(Default)]
struct FakeState {
    volumes: Vec<Volume>,
    snapshots: Vec<Snapshot>,
    backups: Vec<Backup>,
    next_id: u64,
}

struct FakeIaasClient {
    state: Mutex<FakeState>,
}

impl FakeIaasClient {
    fn new() -> Self {
        Self { state: Mutex::new(FakeState::default()) }
    }

    fn with_volume(self, v: Volume) -> Self {
        self.state.lock().unwrap().volumes.push(v);
        self
    }

    fn next_id(&self) -> String {
        let mut s = self.state.lock().unwrap();
        s.next_id += 1;
        format!("id-{}", s.next_id)
    }
}

#[async_trait]
impl NodeClient for FakeIaasClient {
    async fn list_servers(&self, _project_id: &str) -> Result<Vec<Server>, Error> {
        Ok(vec![])
    }
    async fn get_server(&self, _project_id: &str, _server_id: &str) -> Result<Server, Error> {
        Err(Error::NotFound("no servers in fake".into()))
    }
    async fn get_instance_by_id(&self, _project_id: &str, server_id: &str) -> Result<Server, Error> {
        self.get_server(_project_id, server_id).await
    }
}

#[async_trait]
impl IaasClient for FakeIaasClient {
    async fn get_volume(&self, _project_id: &str, volume_id: &str) -> Result<Volume, Error> {
        self.state
            .lock()
            .unwrap()
            .volumes
            .iter()
            .find(|v| v.id == volume_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(volume_id.to_string()))
    }

    async fn get_volumes_by_name(&self, _project_id: &str, name: &str) -> Result<Vec<Volume>, Error> {
        Ok(self.state.lock().unwrap().volumes.iter().filter(|v| v.name == name).cloned().collect())
    }

    async fn create_volume(
        &self,
        _project_id: &str,
        name: &str,
        size_gib: i64,
        availability_zone: &str,
        source: Option<&stackit_types::VolumeSource>,
    ) -> Result<Volume, Error> {
        let v = Volume {
            id: self.next_id(),
            name: name.to_string(),
            size_gib,
            status: VolumeStatus::Available,
            availability_zone: availability_zone.to_string(),
            server_id: None,
            source: source.cloned(),
        };
        self.state.lock().unwrap().volumes.push(v.clone());
        Ok(v)
    }

    async fn delete_volume(&self, _project_id: &str, volume_id: &str) -> Result<(), Error> {
        self.state.lock().unwrap().volumes.retain(|v| v.id != volume_id);
        Ok(())
    }

    async fn expand_volume(&self, _project_id: &str, volume_id: &str, new_size_gib: i64) -> Result<Volume, Error> {
        let mut s = self.state.lock().unwrap();
        let v = s.volumes.iter_mut().find(|v| v.id == volume_id).ok_or_else(|| Error::NotFound(volume_id.into()))?;
        v.size_gib = new_size_gib;
        Ok(v.clone())
    }

    async fn attach_volume(&self, _project_id: &str, _volume_id: &str, _server_id: &str) -> Result<(), Error> {
        Ok(())
    }

    async fn detach_volume(&self, _project_id: &str, _volume_id: &str, _server_id: &str) -> Result<(), Error> {
        Ok(())
    }

    async fn list_volumes(&self, _project_id: &str) -> Result<Vec<Volume>, Error> {
        Ok(self.state.lock().unwrap().volumes.clone())
    }

    async fn list_snapshots(&self, _project_id: &str) -> Result<Vec<Snapshot>, Error> {
        Ok(self.state.lock().unwrap().snapshots.clone())
    }

    async fn get_snapshot_by_id(&self, _project_id: &str, snapshot_id: &str) -> Result<Snapshot, Error> {
        self.state
            .lock()
            .unwrap()
            .snapshots
            .iter()
            .find(|s| s.id == snapshot_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(snapshot_id.to_string()))
    }

    async fn create_snapshot(&self, _project_id: &str, name: &str, source_volume_id: &str) -> Result<Snapshot, Error> {
        let s = Snapshot {
            id: self.next_id(),
            name: name.to_string(),
            source_volume_id: source_volume_id.to_string(),
            status: SnapshotStatus::Ready,
            size_gib: 1,
            created_at: chrono::DateTime::UNIX_EPOCH,
        };
        self.state.lock().unwrap().snapshots.push(s.clone());
        Ok(s)
    }

    async fn delete_snapshot(&self, _project_id: &str, snapshot_id: &str) -> Result<(), Error> {
        self.state.lock().unwrap().snapshots.retain(|s| s.id != snapshot_id);
        Ok(())
    }

    async fn list_backups(&self, _project_id: &str) -> Result<Vec<Backup>, Error> {
        Ok(self.state.lock().unwrap().backups.clone())
    }

    async fn get_backup_by_id(&self, _project_id: &str, backup_id: &str) -> Result<Backup, Error> {
        self.state
            .lock()
            .unwrap()
            .backups
            .iter()
            .find(|b| b.id == backup_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(backup_id.to_string()))
    }

    async fn create_backup(
        &self,
        _project_id: &str,
        name: &str,
        source_volume_id: &str,
        snapshot_id: &str,
    ) -> Result<Backup, Error> {
        let b = Backup {
            id: self.next_id(),
            name: name.to_string(),
            source_volume_id: source_volume_id.to_string(),
            snapshot_id: snapshot_id.to_string(),
            status: BackupStatus::Ready,
            size_gib: 1,
            created_at: chrono::DateTime::UNIX_EPOCH,
        };
        self.state.lock().unwrap().backups.push(b.clone());
        Ok(b)
    }

    async fn delete_backup(&self, _project_id: &str, backup_id: &str) -> Result<(), Error> {
        self.state.lock().unwrap().backups.retain(|b| b.id != backup_id);
        Ok(())
    }
}

fn mount_capability() -> VolumeCapability {
    VolumeCapability {
        access_type: Some(stackit_csi::proto::volume_capability::AccessType::Mount(
            stackit_csi::proto::volume_capability::MountVolume { fs_type: "ext4".into(), mount_flags: vec![] },
        )),
        access_mode: Some(stackit_csi::proto::volume_capability::AccessMode {
            mode: stackit_csi::proto::volume_capability::access_mode::Mode::SingleNodeWriter as i32,
        }),
    }
}

#[tokio::test]
async fn invariant8_resize_required_set_for_content_source() {
    let client = std::sync::Arc::new(
        FakeIaasClient::new().with_volume(Volume {
            id: "src-1".into(),
            name: "src".into(),
            size_gib: 1,
            status: VolumeStatus::Available,
            availability_zone: "eu01-1".into(),
            server_id: None,
            source: None,
        }),
    );
    let svc = ControllerService::new(client, "proj");

    let mut params = BTreeMap::new();
    params.insert("availability".to_string(), "eu01-1".to_string());
    let req = CreateVolumeRequest {
        name: "clone".into(),
        capacity_range_required_bytes: 1024 * 1024 * 1024,
        volume_capabilities: vec![mount_capability()],
        parameters: params,
        source_snapshot_id: String::new(),
        source_volume_id: "src-1".into(),
        accessibility_requirements: None,
    };

    let resp = svc.create_volume(Request::new(req)).await.unwrap().into_inner();
    let volume = resp.volume.unwrap();
    assert_eq!(volume.volume_context.get("ResizeRequired"), Some(&"true".to_string()));
}

#[tokio::test]
async fn invariant9_delete_rpcs_are_idempotent_on_missing_resource() {
    let client = std::sync::Arc::new(FakeIaasClient::new());
    let svc = ControllerService::new(client, "proj");

    svc.delete_volume(Request::new(DeleteVolumeRequest { volume_id: "gone".into() })).await.unwrap();
    svc.delete_snapshot(Request::new(DeleteSnapshotRequest { snapshot_id: "gone".into() })).await.unwrap();
}

#[tokio::test]
async fn s5_create_snapshot_dedups_by_name_and_rejects_different_source() {
    let client = std::sync::Arc::new(
        FakeIaasClient::new().with_volume(Volume {
            id: "v".into(),
            name: "v".into(),
            size_gib: 1,
            status: VolumeStatus::Available,
            availability_zone: "eu01-1".into(),
            server_id: None,
            source: None,
        }),
    );
    let svc = ControllerService::new(client, "proj");

    let first = svc
        .create_snapshot(Request::new(CreateSnapshotRequest {
            source_volume_id: "v".into(),
            name: "s".into(),
            parameters: BTreeMap::new(),
        }))
        .await
        .unwrap()
        .into_inner();
    let first_id = first.snapshot.unwrap().snapshot_id;

    let second = svc
        .create_snapshot(Request::new(CreateSnapshotRequest {
            source_volume_id: "v".into(),
            name: "s".into(),
            parameters: BTreeMap::new(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(second.snapshot.unwrap().snapshot_id, first_id);

    let third = svc
        .create_snapshot(Request::new(CreateSnapshotRequest {
            source_volume_id: "v-prime".into(),
            name: "s".into(),
            parameters: BTreeMap::new(),
        }))
        .await;
    assert_eq!(third.unwrap_err().code(), tonic::Code::AlreadyExists);
}
