// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `cybersentinel server` — runs the manager's axum API in the foreground
//! (§2 "Manager tier", §6).

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use tracing::info;

use cybersentinel_core::application::{DefaultBundleService, DefaultIngestService, DefaultPolicyService, DefaultRegistryService};
use cybersentinel_core::infrastructure::db::Database;
use cybersentinel_core::infrastructure::event_bus::EventBus;
use cybersentinel_core::infrastructure::{create_agent_repository, create_event_repository, create_policy_repository, StorageBackend};
use cybersentinel_core::presentation::router::build_router;
use cybersentinel_core::presentation::state::AppState;

use crate::daemon::check_daemon_running;

const DEFAULT_LIVENESS_WINDOW_SECS: i64 = 90;
const DEFAULT_HIGH_WATER_MARK: usize = 10_000;

#[derive(Debug, Subcommand)]
pub enum ServerCommand {
    /// Run the manager API in the foreground
    Run {
        /// Address to bind the HTTP API to
        #[arg(long, env = "CYBERSENTINEL_LISTEN_ADDR", default_value = "0.0.0.0:8443")]
        listen_addr: String,

        /// Storage backend: "memory" or "postgres"
        #[arg(long, env = "CYBERSENTINEL_STORAGE", default_value = "memory")]
        storage: String,

        /// PostgreSQL connection string, required when --storage postgres
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
    },
    /// Check whether a manager is reachable at `listen_addr`
    Status {
        #[arg(long, env = "CYBERSENTINEL_LISTEN_ADDR", default_value = "127.0.0.1:8443")]
        listen_addr: String,
    },
}

pub async fn handle_command(command: ServerCommand) -> Result<()> {
    match command {
        ServerCommand::Run { listen_addr, storage, database_url } => run(listen_addr, storage, database_url).await,
        ServerCommand::Status { listen_addr } => status(listen_addr).await,
    }
}

async fn run(listen_addr: String, storage: String, database_url: Option<String>) -> Result<()> {
    let _ = dotenvy::dotenv();

    let backend = match storage.as_str() {
        "memory" => StorageBackend::InMemory,
        "postgres" => {
            let url = database_url.context("--database-url (or DATABASE_URL) is required for --storage postgres")?;
            let db = Database::connect(&url).await.context("failed to connect to postgres")?;
            db.migrate().await.context("failed to run migrations")?;
            StorageBackend::Postgres(db)
        }
        other => anyhow::bail!("unknown storage backend: {other} (expected \"memory\" or \"postgres\")"),
    };

    let registry =
        DefaultRegistryService::new(create_agent_repository(&backend), chrono::Duration::seconds(DEFAULT_LIVENESS_WINDOW_SECS));
    let policies = DefaultPolicyService::new(create_policy_repository(&backend));
    let bundles = DefaultBundleService::new(create_policy_repository(&backend));
    let ingestor = DefaultIngestService::new(create_event_repository(&backend), create_policy_repository(&backend), DEFAULT_HIGH_WATER_MARK);

    let state = AppState {
        registry: std::sync::Arc::new(registry),
        policies: std::sync::Arc::new(policies),
        bundles: std::sync::Arc::new(bundles),
        ingestor: std::sync::Arc::new(ingestor),
        events: EventBus::with_default_capacity(),
    };

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&listen_addr).await.with_context(|| format!("failed to bind {listen_addr}"))?;
    info!("manager listening on {listen_addr}");

    crate::daemon::write_pid_file(std::process::id())?;
    let result = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await;
    let _ = crate::daemon::remove_pid_file();
    result.context("manager server error")
}

async fn status(listen_addr: String) -> Result<()> {
    let (host, port) = listen_addr.rsplit_once(':').context("listen_addr must be host:port")?;
    let port: u16 = port.parse().context("invalid port")?;

    match check_daemon_running(host, port).await? {
        crate::daemon::DaemonStatus::Running { pid, uptime } => {
            println!("{} manager is {}", "✓".green(), "running".green().bold());
            if pid != 0 {
                println!("  pid: {pid}");
            }
            if let Some(uptime) = uptime {
                println!("  uptime: {uptime}s");
            }
        }
        crate::daemon::DaemonStatus::Unhealthy { pid, error } => {
            println!("{} manager is {}: {}", "!".yellow(), "unhealthy".yellow().bold(), error);
            if pid != 0 {
                println!("  pid: {pid}");
            }
        }
        crate::daemon::DaemonStatus::Stopped => {
            println!("{} manager is {}", "✗".red(), "stopped".red().bold());
        }
    }
    Ok(())
}

async fn shutdown_signal() {
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
    info!("shutdown signal received, draining connections");
}
