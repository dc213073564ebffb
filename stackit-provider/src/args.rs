//! CLI surface for the `ccm` binary. Grounded on the teacher's
//! `storage/src/args.rs` `Cli`/`Commands` split between a long-running
//! server command and a one-shot health probe.

use std::net::SocketAddr;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the reconcile loop and metrics server.
    Run(RunArgs),
    /// One-shot readiness probe against a running instance's `/healthz`.
    Probe(ProbeArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to the YAML provider config (§6).
    #[arg(long, env = "CCM_CONFIG", default_value = "/etc/stackit/ccm.yaml")]
    pub config: String,

    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    pub metrics_addr: SocketAddr,
}

#[derive(Parser, Debug, Clone)]
pub struct ProbeArgs {
    #[arg(long, env = "METRICS_ADDR", default_value = "http://127.0.0.1:8080")]
    pub target: String,
}
