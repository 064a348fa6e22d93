//! # CLI Interface
//!
//! Defines the command-line argument structure for `vela-node` using
//! `clap` derive. Two subcommands: `run` and `version`.

use clap::{Parser, Subcommand};

/// VELA escrow settlement node.
///
/// Runs the escrow engine as a devnet service: serves the REST/WebSocket
/// API, settles withdrawals against an in-memory account book, and exposes
/// Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "vela-node",
    about = "VELA escrow settlement node",
    version,
    propagate_version = true
)]
pub struct VelaNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the VELA node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the escrow node.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Hex-encoded public key holding the owner capability.
    ///
    /// Gates configuration changes and receives withdrawn protocol fees.
    #[arg(long, env = "VELA_OWNER")]
    pub owner: String,

    /// Hex-encoded public key of the initial arbitrator.
    #[arg(long, env = "VELA_ARBITRATOR")]
    pub arbitrator: String,

    /// Initial protocol fee rate in basis points (max 1000 = 10%).
    #[arg(
        long,
        env = "VELA_FEE_RATE_BPS",
        default_value_t = vela_protocol::config::DEFAULT_FEE_RATE_BPS
    )]
    pub fee_rate_bps: u32,

    /// Port for the REST and WebSocket API.
    #[arg(long, env = "VELA_RPC_PORT", default_value_t = vela_protocol::config::DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(
        long,
        env = "VELA_METRICS_PORT",
        default_value_t = vela_protocol::config::DEFAULT_METRICS_PORT
    )]
    pub metrics_port: u16,

    /// Network label reported by `/status`.
    #[arg(long, default_value = "devnet")]
    pub network: String,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "VELA_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        VelaNodeCli::command().debug_assert();
    }

    #[test]
    fn run_parses_with_required_roles() {
        let cli = VelaNodeCli::try_parse_from([
            "vela-node",
            "run",
            "--owner",
            "owner_pk",
            "--arbitrator",
            "arbiter_pk",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.owner, "owner_pk");
                assert_eq!(args.arbitrator, "arbiter_pk");
                assert_eq!(
                    args.fee_rate_bps,
                    vela_protocol::config::DEFAULT_FEE_RATE_BPS
                );
            }
            other => panic!("expected Run, got {:?}", other),
        }
    }
}
