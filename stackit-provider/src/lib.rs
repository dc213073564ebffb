//! Cloud Controller Manager core: pure spec translation and diffing (C1,
//! C4, C5), plus the I/O-performing reconciler and instances adapters (C6,
//! C7) wired behind the small `CloudProvider` contract (C8).

pub mod annotations;
pub mod args;
pub mod compare;
pub mod config;
pub mod diff;
pub mod instances;
pub mod provider;
pub mod reconcile;
pub mod translate;

pub use provider::{CloudProvider, Instances as InstancesProvider, LoadBalancer as LoadBalancerProvider};
