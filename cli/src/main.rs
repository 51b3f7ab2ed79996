// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # CyberSentinel CLI
//!
//! The `cybersentinel` binary is both halves of the platform in one tool:
//!
//! - `cybersentinel server run` — the manager's HTTP API (registry, policy
//!   store, bundle assembler, event ingestor, §2 "Manager tier").
//! - `cybersentinel agent run` — the endpoint agent runtime (monitors,
//!   classifier, enforcer, uploader, §2 "Endpoint tier").
//! - `cybersentinel policy` / `cybersentinel events` — thin admin clients
//!   against a running manager's `/api/v1` surface (§6).
//!
//! Both halves run in the foreground under the caller's process supervisor
//! (systemd, a container entrypoint, …); neither forks or backgrounds
//! itself. `daemon`/`agent status` probe liveness via `/health` plus a PID
//! file recorded on the local host.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod daemon;

use commands::{AgentCommand, EventsCommand, PolicyCommand, ServerCommand};

#[derive(Parser)]
#[command(name = "cybersentinel")]
#[command(version, about = "CyberSentinel DLP manager and endpoint agent", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Manager base URL used by the `policy` and `events` admin commands
    #[arg(long, global = true, env = "CYBERSENTINEL_SERVER_URL", default_value = "http://127.0.0.1:8443")]
    server_url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "CYBERSENTINEL_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run or probe the manager API
    Server {
        #[command(subcommand)]
        command: ServerCommand,
    },
    /// Run or probe the endpoint agent
    Agent {
        #[command(subcommand)]
        command: AgentCommand,
    },
    /// Manage policies on the manager
    Policy {
        #[command(subcommand)]
        command: PolicyCommand,
    },
    /// Query the event log on the manager
    Events {
        #[command(subcommand)]
        command: EventsCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // `agent run` installs its own subscriber (stdout + rotating log file,
    // §5) since it needs the endpoint config's log directory first; every
    // other command gets the plain stdout subscriber here.
    if !matches!(cli.command, Commands::Agent { command: AgentCommand::Run { .. } }) {
        init_logging(&cli.log_level)?;
    }

    match cli.command {
        Commands::Server { command } => commands::server::handle_command(command).await,
        Commands::Agent { command } => commands::agent::handle_command(command, &cli.log_level).await,
        Commands::Policy { command } => commands::policy::handle_command(command, &cli.server_url).await,
        Commands::Events { command } => commands::events::handle_command(command, &cli.server_url).await,
    }
}

/// Initializes the `tracing` subscriber the way the manager expects:
/// `RUST_LOG` wins if set, else the CLI's `--log-level`.
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level)).context("failed to create log filter")?;

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).compact().init();

    Ok(())
}
