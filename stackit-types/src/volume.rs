use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeStatus {
    Creating,
    Available,
    InUse,
    Error,
    Deleting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeSource {
    Snapshot(String),
    Volume(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub id: String,
    pub name: String,
    pub size_gib: i64,
    pub status: VolumeStatus,
    pub availability_zone: String,
    pub server_id: Option<String>,
    pub source: Option<VolumeSource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotStatus {
    Creating,
    Ready,
    Error,
    Deleting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub id: String,
    pub name: String,
    pub source_volume_id: String,
    pub status: SnapshotStatus,
    pub size_gib: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackupStatus {
    Creating,
    Ready,
    Error,
    Deleting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    pub id: String,
    pub name: String,
    pub source_volume_id: String,
    pub snapshot_id: String,
    pub status: BackupStatus,
    pub size_gib: i64,
    pub created_at: DateTime<Utc>,
}
