//! Ambient stack shared by the `ccm` and `csi-stackit` daemons: the error
//! taxonomy (§7), graceful shutdown, bounded backoff/polling, the
//! all-or-none env var check (§6), and the Prometheus `/metrics` server.

pub mod backoff;
pub mod env;
mod error;
pub mod metrics;
pub mod shutdown;

pub use backoff::{Backoff, poll_until};
pub use error::{Error, Result};
