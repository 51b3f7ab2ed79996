// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! PID file bookkeeping and HTTP health probing shared by the `server` and
//! `agent` `status` subcommands. Neither subcommand forks or daemonizes —
//! both run in the foreground under the caller's process supervisor — so
//! this module only tracks whether one is already up.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[cfg(unix)]
const PID_FILE: &str = "/var/run/cybersentinel/cybersentinel.pid";
#[cfg(unix)]
const PID_FILE_FALLBACK: &str = "/tmp/cybersentinel.pid";

#[derive(Debug, Clone)]
pub enum DaemonStatus {
    Running { pid: u32, uptime: Option<u64> },
    Stopped,
    Unhealthy { pid: u32, error: String },
}

/// HTTP health check first (works against a remote manager too), falling
/// back to the local PID file only to recover the PID for display.
pub async fn check_daemon_running(host: &str, port: u16) -> Result<DaemonStatus> {
    let client = reqwest::Client::builder().timeout(Duration::from_millis(500)).build()?;

    let base_url = if host.starts_with("http://") || host.starts_with("https://") {
        format!("{host}:{port}")
    } else {
        format!("http://{host}:{port}")
    };
    let health_url = format!("{base_url}/health");

    let pid_file = get_pid_file_path();
    let local_pid = std::fs::read_to_string(&pid_file).ok().and_then(|s| s.trim().parse::<u32>().ok());

    match client.get(&health_url).send().await {
        Ok(resp) if resp.status().is_success() => {
            let uptime = resp.json::<serde_json::Value>().await.ok().and_then(|v| v["uptime_seconds"].as_u64());
            Ok(DaemonStatus::Running { pid: local_pid.unwrap_or(0), uptime })
        }
        Ok(resp) => Ok(DaemonStatus::Unhealthy { pid: local_pid.unwrap_or(0), error: format!("HTTP {}", resp.status()) }),
        Err(e) => {
            if let Some(pid) = local_pid {
                if process_exists(pid) {
                    return Ok(DaemonStatus::Unhealthy { pid, error: e.to_string() });
                }
                let _ = std::fs::remove_file(&pid_file);
            }
            Ok(DaemonStatus::Stopped)
        }
    }
}

fn get_pid_file_path() -> PathBuf {
    #[cfg(unix)]
    {
        let uid = unsafe { libc::geteuid() };
        if uid == 0 {
            PathBuf::from(PID_FILE)
        } else {
            PathBuf::from(PID_FILE_FALLBACK)
        }
    }

    #[cfg(windows)]
    {
        PathBuf::from("C:\\ProgramData\\cybersentinel\\cybersentinel.pid")
    }
}

fn process_exists(_pid: u32) -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::kill(_pid as i32, 0) == 0 }
    }

    #[cfg(windows)]
    {
        true
    }
}

pub fn write_pid_file(pid: u32) -> Result<()> {
    let pid_file = get_pid_file_path();
    if let Some(parent) = pid_file.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    std::fs::write(&pid_file, pid.to_string()).with_context(|| format!("failed to write PID file: {pid_file:?}"))?;
    info!("wrote PID file: {:?}", pid_file);
    Ok(())
}

pub fn remove_pid_file() -> Result<()> {
    let pid_file = get_pid_file_path();
    if pid_file.exists() {
        std::fs::remove_file(&pid_file).with_context(|| format!("failed to remove PID file: {pid_file:?}"))?;
        info!("removed PID file: {:?}", pid_file);
    }
    Ok(())
}
