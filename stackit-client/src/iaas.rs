//! `IaasClient`/`NodeClient`: the typed adapter over the STACKIT compute and
//! block-storage HTTP API (C2), used by both the CCM's instance resolution
//! (§4.6) and the CSI controller/node services (§4.4/§4.5).
//!
//! The `Wait*` methods are default methods built on `stackit_common::poll_until`
//! so every caller gets the same backoff schedule (§4.4 step 7) instead of
//! hand-rolled retry loops, the way the teacher centralizes polling in
//! `common::wait` rather than duplicating it per caller.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use stackit_common::{poll_until, Backoff, Error};
use stackit_types::{Backup, BackupStatus, Server, Snapshot, SnapshotStatus, Volume, VolumeStatus};

use crate::dto::{BackupDto, ServerDto, SnapshotDto, VolumeDto};
use crate::http::check_status;
use crate::metrics::{instrumented, op_name};

/// Matches §4.4 step 7's tuning knobs: 20s initial, ×1.28, 5 steps.
pub const DEFAULT_BACKOFF: Backoff = Backoff::new(Duration::from_secs(20), 1.28, 5);

#[async_trait]
pub trait NodeClient: Send + Sync {
    async fn list_servers(&self, project_id: &str) -> Result<Vec<Server>, Error>;
    async fn get_server(&self, project_id: &str, server_id: &str) -> Result<Server, Error>;
    async fn get_instance_by_id(&self, project_id: &str, instance_id: &str) -> Result<Server, Error>;
}

#[async_trait]
pub trait IaasClient: NodeClient {
    async fn get_volume(&self, project_id: &str, volume_id: &str) -> Result<Volume, Error>;
    async fn get_volumes_by_name(&self, project_id: &str, name: &str) -> Result<Vec<Volume>, Error>;
    async fn create_volume(
        &self,
        project_id: &str,
        name: &str,
        size_gib: i64,
        availability_zone: &str,
        source: Option<&stackit_types::VolumeSource>,
    ) -> Result<Volume, Error>;
    async fn delete_volume(&self, project_id: &str, volume_id: &str) -> Result<(), Error>;
    async fn expand_volume(&self, project_id: &str, volume_id: &str, new_size_gib: i64) -> Result<Volume, Error>;
    async fn attach_volume(&self, project_id: &str, volume_id: &str, server_id: &str) -> Result<(), Error>;
    async fn detach_volume(&self, project_id: &str, volume_id: &str, server_id: &str) -> Result<(), Error>;
    async fn list_volumes(&self, project_id: &str) -> Result<Vec<Volume>, Error>;

    async fn list_snapshots(&self, project_id: &str) -> Result<Vec<Snapshot>, Error>;
    async fn get_snapshot_by_id(&self, project_id: &str, snapshot_id: &str) -> Result<Snapshot, Error>;
    async fn create_snapshot(
        &self,
        project_id: &str,
        name: &str,
        source_volume_id: &str,
    ) -> Result<Snapshot, Error>;
    async fn delete_snapshot(&self, project_id: &str, snapshot_id: &str) -> Result<(), Error>;

    async fn list_backups(&self, project_id: &str) -> Result<Vec<Backup>, Error>;
    async fn get_backup_by_id(&self, project_id: &str, backup_id: &str) -> Result<Backup, Error>;
    async fn create_backup(
        &self,
        project_id: &str,
        name: &str,
        source_volume_id: &str,
        snapshot_id: &str,
    ) -> Result<Backup, Error>;
    async fn delete_backup(&self, project_id: &str, backup_id: &str) -> Result<(), Error>;

    /// Polls `get_volume` until `server_id` matches `expected_server`.
    async fn wait_disk_attached(
        &self,
        project_id: &str,
        volume_id: &str,
        expected_server: &str,
        cancel: &CancellationToken,
    ) -> Result<Volume, Error> {
        poll_until(&DEFAULT_BACKOFF, cancel, "timed out waiting for volume attach", || async {
            let v = self.get_volume(project_id, volume_id).await?;
            Ok((v.server_id.as_deref() == Some(expected_server)).then_some(v))
        })
        .await
    }

    /// Polls `get_volume` until `server_id` is empty.
    async fn wait_disk_detached(
        &self,
        project_id: &str,
        volume_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Volume, Error> {
        poll_until(&DEFAULT_BACKOFF, cancel, "timed out waiting for volume detach", || async {
            let v = self.get_volume(project_id, volume_id).await?;
            Ok(v.server_id.is_none().then_some(v))
        })
        .await
    }

    /// Polls `get_volume` until its status is in `targets`. Accepts a custom
    /// backoff per spec §6's "optionally with custom backoff" clause.
    async fn wait_volume_target_status(
        &self,
        project_id: &str,
        volume_id: &str,
        targets: &[VolumeStatus],
        backoff: Option<&Backoff>,
        cancel: &CancellationToken,
    ) -> Result<Volume, Error> {
        let backoff = backoff.unwrap_or(&DEFAULT_BACKOFF);
        poll_until(backoff, cancel, "timed out waiting for volume status", || async {
            let v = self.get_volume(project_id, volume_id).await?;
            Ok(targets.contains(&v.status).then_some(v))
        })
        .await
    }

    async fn wait_snapshot_ready(
        &self,
        project_id: &str,
        snapshot_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Snapshot, Error> {
        poll_until(&DEFAULT_BACKOFF, cancel, "timed out waiting for snapshot ready", || async {
            let s = self.get_snapshot_by_id(project_id, snapshot_id).await?;
            Ok((s.status == SnapshotStatus::Ready).then_some(s))
        })
        .await
    }

    /// Accepts a custom backoff per §4.4's bounded `sizeGiB × maxSecondsPerGB`
    /// timeout on the backup-creation wait, distinct from the fixed volume
    /// schedule.
    async fn wait_backup_ready(
        &self,
        project_id: &str,
        backup_id: &str,
        backoff: Option<&Backoff>,
        cancel: &CancellationToken,
    ) -> Result<Backup, Error> {
        let backoff = backoff.unwrap_or(&DEFAULT_BACKOFF);
        poll_until(backoff, cancel, "timed out waiting for backup ready", || async {
            let b = self.get_backup_by_id(project_id, backup_id).await?;
            Ok((b.status == BackupStatus::Ready).then_some(b))
        })
        .await
    }
}

pub struct HttpIaasClient {
    client: Client,
    base_url: String,
}

impl HttpIaasClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, method: &str, path: &str) -> Result<T, Error> {
        let op = op_name(method, path);
        instrumented(&op, async {
            let resp = self.client.request(method.parse().unwrap(), self.url(path)).send().await?;
            let resp = check_status(resp).await?;
            Ok(resp.json::<T>().await?)
        })
        .await
    }
}

#[async_trait]
impl NodeClient for HttpIaasClient {
    async fn list_servers(&self, project_id: &str) -> Result<Vec<Server>, Error> {
        let path = format!("/v1/projects/{project_id}/servers");
        let dtos: Vec<ServerDto> = self.get_json("GET", &path).await?;
        Ok(dtos.into_iter().map(Server::from).collect())
    }

    async fn get_server(&self, project_id: &str, server_id: &str) -> Result<Server, Error> {
        let path = format!("/v1/projects/{project_id}/servers/{server_id}");
        let dto: ServerDto = self.get_json("GET", &path).await?;
        Ok(Server::from(dto))
    }

    async fn get_instance_by_id(&self, project_id: &str, instance_id: &str) -> Result<Server, Error> {
        self.get_server(project_id, instance_id).await
    }
}

#[async_trait]
impl IaasClient for HttpIaasClient {
    async fn get_volume(&self, project_id: &str, volume_id: &str) -> Result<Volume, Error> {
        let path = format!("/v1/projects/{project_id}/volumes/{volume_id}");
        let dto: VolumeDto = self.get_json("GET", &path).await?;
        dto.into_domain().map_err(Error::internal)
    }

    async fn get_volumes_by_name(&self, project_id: &str, name: &str) -> Result<Vec<Volume>, Error> {
        let path = format!("/v1/projects/{project_id}/volumes?name={name}");
        let dtos: Vec<VolumeDto> = self.get_json("GET", &path).await?;
        dtos.into_iter()
            .map(|d| d.into_domain().map_err(Error::internal))
            .collect()
    }

    async fn create_volume(
        &self,
        project_id: &str,
        name: &str,
        size_gib: i64,
        availability_zone: &str,
        source: Option<&stackit_types::VolumeSource>,
    ) -> Result<Volume, Error> {
        let path = format!("/v1/projects/{project_id}/volumes");
        let op = op_name("POST", &path);
        instrumented(&op, async {
            #[derive(serde::Serialize)]
            struct SourceReq<'a> {
                #[serde(rename = "type")]
                kind: &'a str,
                id: &'a str,
            }
            #[derive(serde::Serialize)]
            struct Req<'a> {
                name: &'a str,
                #[serde(rename = "sizeGib")]
                size_gib: i64,
                #[serde(rename = "availabilityZone")]
                availability_zone: &'a str,
                #[serde(skip_serializing_if = "Option::is_none")]
                source: Option<SourceReq<'a>>,
            }
            let source = source.map(|s| match s {
                stackit_types::VolumeSource::Snapshot(id) => SourceReq { kind: "snapshot", id },
                stackit_types::VolumeSource::Volume(id) => SourceReq { kind: "volume", id },
            });
            let resp = self
                .client
                .post(self.url(&path))
                .json(&Req {
                    name,
                    size_gib,
                    availability_zone,
                    source,
                })
                .send()
                .await?;
            let resp = check_status(resp).await?;
            let dto: VolumeDto = resp.json().await?;
            dto.into_domain().map_err(Error::internal)
        })
        .await
    }

    async fn delete_volume(&self, project_id: &str, volume_id: &str) -> Result<(), Error> {
        let path = format!("/v1/projects/{project_id}/volumes/{volume_id}");
        let op = op_name("DELETE", &path);
        instrumented(&op, async {
            let resp = self.client.delete(self.url(&path)).send().await?;
            match check_status(resp).await {
                Ok(_) => Ok(()),
                Err(e) if e.is_not_found() => Ok(()),
                Err(e) => Err(e),
            }
        })
        .await
    }

    async fn expand_volume(&self, project_id: &str, volume_id: &str, new_size_gib: i64) -> Result<Volume, Error> {
        let path = format!("/v1/projects/{project_id}/volumes/{volume_id}/expand");
        let op = op_name("POST", &path);
        instrumented(&op, async {
            #[derive(serde::Serialize)]
            struct Req {
                #[serde(rename = "sizeGib")]
                size_gib: i64,
            }
            let resp = self
                .client
                .post(self.url(&path))
                .json(&Req { size_gib: new_size_gib })
                .send()
                .await?;
            let resp = check_status(resp).await?;
            let dto: VolumeDto = resp.json().await?;
            dto.into_domain().map_err(Error::internal)
        })
        .await
    }

    async fn attach_volume(&self, project_id: &str, volume_id: &str, server_id: &str) -> Result<(), Error> {
        let path = format!("/v1/projects/{project_id}/servers/{server_id}/volume-attachments");
        let op = op_name("POST", &path);
        instrumented(&op, async {
            #[derive(serde::Serialize)]
            struct Req<'a> {
                #[serde(rename = "volumeId")]
                volume_id: &'a str,
            }
            let resp = self
                .client
                .post(self.url(&path))
                .json(&Req { volume_id })
                .send()
                .await?;
            check_status(resp).await?;
            Ok(())
        })
        .await
    }

    async fn detach_volume(&self, project_id: &str, volume_id: &str, server_id: &str) -> Result<(), Error> {
        let path = format!("/v1/projects/{project_id}/servers/{server_id}/volume-attachments/{volume_id}");
        let op = op_name("DELETE", &path);
        instrumented(&op, async {
            let resp = self.client.delete(self.url(&path)).send().await?;
            match check_status(resp).await {
                Ok(_) => Ok(()),
                Err(e) if e.is_not_found() => Ok(()),
                Err(e) => Err(e),
            }
        })
        .await
    }

    async fn list_volumes(&self, project_id: &str) -> Result<Vec<Volume>, Error> {
        let path = format!("/v1/projects/{project_id}/volumes");
        let dtos: Vec<VolumeDto> = self.get_json("GET", &path).await?;
        dtos.into_iter()
            .map(|d| d.into_domain().map_err(Error::internal))
            .collect()
    }

    async fn list_snapshots(&self, project_id: &str) -> Result<Vec<Snapshot>, Error> {
        let path = format!("/v1/projects/{project_id}/snapshots");
        let dtos: Vec<SnapshotDto> = self.get_json("GET", &path).await?;
        dtos.into_iter()
            .map(|d| d.into_domain().map_err(Error::internal))
            .collect()
    }

    async fn get_snapshot_by_id(&self, project_id: &str, snapshot_id: &str) -> Result<Snapshot, Error> {
        let path = format!("/v1/projects/{project_id}/snapshots/{snapshot_id}");
        let dto: SnapshotDto = self.get_json("GET", &path).await?;
        dto.into_domain().map_err(Error::internal)
    }

    async fn create_snapshot(
        &self,
        project_id: &str,
        name: &str,
        source_volume_id: &str,
    ) -> Result<Snapshot, Error> {
        let path = format!("/v1/projects/{project_id}/snapshots");
        let op = op_name("POST", &path);
        instrumented(&op, async {
            #[derive(serde::Serialize)]
            struct Req<'a> {
                name: &'a str,
                #[serde(rename = "sourceVolumeId")]
                source_volume_id: &'a str,
            }
            let resp = self
                .client
                .post(self.url(&path))
                .json(&Req { name, source_volume_id })
                .send()
                .await?;
            let resp = check_status(resp).await?;
            let dto: SnapshotDto = resp.json().await?;
            dto.into_domain().map_err(Error::internal)
        })
        .await
    }

    async fn delete_snapshot(&self, project_id: &str, snapshot_id: &str) -> Result<(), Error> {
        let path = format!("/v1/projects/{project_id}/snapshots/{snapshot_id}");
        let op = op_name("DELETE", &path);
        instrumented(&op, async {
            let resp = self.client.delete(self.url(&path)).send().await?;
            match check_status(resp).await {
                Ok(_) => Ok(()),
                Err(e) if e.is_not_found() => Ok(()),
                Err(e) => Err(e),
            }
        })
        .await
    }

    async fn list_backups(&self, project_id: &str) -> Result<Vec<Backup>, Error> {
        let path = format!("/v1/projects/{project_id}/backups");
        let dtos: Vec<BackupDto> = self.get_json("GET", &path).await?;
        dtos.into_iter()
            .map(|d| d.into_domain().map_err(Error::internal))
            .collect()
    }

    async fn get_backup_by_id(&self, project_id: &str, backup_id: &str) -> Result<Backup, Error> {
        let path = format!("/v1/projects/{project_id}/backups/{backup_id}");
        let dto: BackupDto = self.get_json("GET", &path).await?;
        dto.into_domain().map_err(Error::internal)
    }

    async fn create_backup(
        &self,
        project_id: &str,
        name: &str,
        source_volume_id: &str,
        snapshot_id: &str,
    ) -> Result<Backup, Error> {
        let path = format!("/v1/projects/{project_id}/backups");
        let op = op_name("POST", &path);
        instrumented(&op, async {
            #[derive(serde::Serialize)]
            struct Req<'a> {
                name: &'a str,
                #[serde(rename = "sourceVolumeId")]
                source_volume_id: &'a str,
                #[serde(rename = "snapshotId")]
                snapshot_id: &'a str,
            }
            let resp = self
                .client
                .post(self.url(&path))
                .json(&Req { name, source_volume_id, snapshot_id })
                .send()
                .await?;
            let resp = check_status(resp).await?;
            let dto: BackupDto = resp.json().await?;
            dto.into_domain().map_err(Error::internal)
        })
        .await
    }

    async fn delete_backup(&self, project_id: &str, backup_id: &str) -> Result<(), Error> {
        let path = format!("/v1/projects/{project_id}/backups/{backup_id}");
        let op = op_name("DELETE", &path);
        instrumented(&op, async {
            let resp = self.client.delete(self.url(&path)).send().await?;
            match check_status(resp).await {
                Ok(_) => Ok(()),
                Err(e) if e.is_not_found() => Ok(()),
                Err(e) => Err(e),
            }
        })
        .await
    }
}
