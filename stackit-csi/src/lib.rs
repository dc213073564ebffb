//! CSI controller and node plugins for STACKIT block volumes (C9, C10),
//! plus the small Identity service every CSI plugin exposes.

pub mod args;
pub mod config;
pub mod controller;
pub mod identity;
pub mod node;
pub mod status;

pub mod proto {
    tonic::include_proto!("csi.v1");
}
