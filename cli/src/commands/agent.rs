// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `cybersentinel agent` — runs the endpoint daemon in the foreground (§2
//! "Endpoint tier", §4.4).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use cybersentinel_endpoint::application::PlatformHooks;
use cybersentinel_endpoint::Endpoint;

use crate::daemon::check_daemon_running;

fn default_config_path() -> PathBuf {
    dirs_next::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("cybersentinel").join("agent.json")
}

#[derive(Debug, Subcommand)]
pub enum AgentCommand {
    /// Run the endpoint monitors and report to the manager
    Run {
        /// Path to the local agent config (created on first run)
        #[arg(long, env = "CYBERSENTINEL_AGENT_CONFIG")]
        config: Option<PathBuf>,

        /// Skip attaching a real clipboard backend (headless hosts)
        #[arg(long)]
        headless: bool,
    },
    /// Check whether the manager this agent reports to is reachable
    Status {
        #[arg(long, env = "CYBERSENTINEL_AGENT_CONFIG")]
        config: Option<PathBuf>,
    },
}

pub async fn handle_command(command: AgentCommand, log_level: &str) -> Result<()> {
    match command {
        AgentCommand::Run { config, headless } => run(config, headless, log_level).await,
        AgentCommand::Status { config } => status(config).await,
    }
}

async fn run(config: Option<PathBuf>, headless: bool, log_level: &str) -> Result<()> {
    let config_path = config.unwrap_or_else(default_config_path);
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("failed to create {parent:?}"))?;
    }

    let hooks = if headless { PlatformHooks::null() } else { PlatformHooks::with_system_clipboard() };
    let endpoint = Endpoint::bootstrap(config_path, hooks).context("failed to bootstrap endpoint agent")?;

    // Held for the process lifetime: dropping it stops the non-blocking
    // file-writer thread and truncates in-flight log lines.
    let _log_guard = cybersentinel_endpoint::application::logging::init(&endpoint.config().log_dir(), log_level)
        .context("failed to initialize agent logging")?;
    info!("cybersentinel agent starting");

    let shutdown = CancellationToken::new();
    let shutdown_for_signal = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("shutdown signal received, stopping monitors");
        shutdown_for_signal.cancel();
    });

    crate::daemon::write_pid_file(std::process::id())?;
    endpoint.run(shutdown).await;
    let _ = crate::daemon::remove_pid_file();
    Ok(())
}

async fn status(config: Option<PathBuf>) -> Result<()> {
    let config_path = config.unwrap_or_else(default_config_path);
    let endpoint_config = cybersentinel_endpoint::EndpointConfig::load(&config_path)?;
    let (host, port) = endpoint_config
        .server_url
        .trim_start_matches("http://")
        .trim_start_matches("https://")
        .split_once(':')
        .map(|(h, p)| (h.to_string(), p.parse::<u16>().unwrap_or(8443)))
        .unwrap_or(("127.0.0.1".to_string(), 8443));

    match check_daemon_running(&host, port).await? {
        crate::daemon::DaemonStatus::Running { .. } => {
            println!("{} manager at {} is {}", "✓".green(), endpoint_config.server_url, "reachable".green().bold());
        }
        crate::daemon::DaemonStatus::Unhealthy { error, .. } => {
            println!("{} manager at {} is {}: {}", "!".yellow(), endpoint_config.server_url, "unhealthy".yellow().bold(), error);
        }
        crate::daemon::DaemonStatus::Stopped => {
            println!("{} manager at {} is {}", "✗".red(), endpoint_config.server_url, "unreachable".red().bold());
        }
    }
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async { tokio::signal::ctrl_c().await.expect("failed to install ctrl_c handler") };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).expect("failed to install SIGTERM handler").recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
