//! Typed HTTP adapters over the STACKIT load balancer and IaaS APIs (C2, C3),
//! plus the outbound metrics wrapper (C11). Pure-data translation and diffing
//! live in `stackit-provider`; this crate only talks to the network.

mod dto;
mod http;
mod metrics;

pub mod iaas;
pub mod lb;

pub use iaas::{HttpIaasClient, IaasClient, NodeClient, DEFAULT_BACKOFF};
pub use lb::{HttpLoadbalancerClient, LoadbalancerClient};
