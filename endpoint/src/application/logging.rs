// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Endpoint log file setup (§5 "Resource caps": "Log file: rotated when
//! size ≥ 10 MB; retains N previous files (default 5)"). The endpoint never
//! surfaces errors to the user directly (§7) — this log file plus the
//! events visible on the manager are the only diagnosis surface.
//!
//! `tracing-appender` rotates on a time boundary (daily), not a byte
//! threshold — it has no size-triggered policy. We run a daily roller and,
//! on every startup, prune files under the configured log directory down to
//! `MAX_RETAINED_LOGS`, giving the retention guarantee even though the
//! rotation trigger is time- rather than size-based. This trade-off is
//! recorded in DESIGN.md.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const MAX_RETAINED_LOGS: usize = 5;
const LOG_FILE_PREFIX: &str = "cybersentinel-agent.log";

/// Installs the global `tracing` subscriber for the agent process: compact
/// output to stdout plus a non-blocking rolling file writer under
/// `log_dir`. The returned [`WorkerGuard`] must be held for the lifetime of
/// the process — dropping it stops the background flush thread.
pub fn init(log_dir: &Path, level: &str) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;
    prune_old_logs(log_dir, LOG_FILE_PREFIX, MAX_RETAINED_LOGS);

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).compact())
        .with(tracing_subscriber::fmt::layer().with_target(false).with_ansi(false).with_writer(non_blocking))
        .init();

    Ok(guard)
}

/// Deletes the oldest files under `dir` matching `prefix` until at most
/// `keep - 1` remain, making room for the file this run is about to write
/// (so the directory never holds more than `keep` in total).
fn prune_old_logs(dir: &Path, prefix: &str, keep: usize) {
    let Ok(entries) = std::fs::read_dir(dir) else { return };
    let mut files: Vec<(std::time::SystemTime, std::path::PathBuf)> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(prefix))
        .filter_map(|e| e.metadata().ok().and_then(|m| m.modified().ok()).map(|t| (t, e.path())))
        .collect();
    files.sort_by_key(|(modified, _)| *modified);

    while files.len() >= keep {
        let (_, oldest) = files.remove(0);
        let _ = std::fs::remove_file(&oldest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prunes_down_to_keep_minus_one() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..7 {
            let path = dir.path().join(format!("{LOG_FILE_PREFIX}.2026-01-0{i}"));
            std::fs::write(&path, b"x").unwrap();
            // Force distinct mtimes so the oldest-first sort is deterministic.
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        prune_old_logs(dir.path(), LOG_FILE_PREFIX, MAX_RETAINED_LOGS);

        let remaining = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(remaining, MAX_RETAINED_LOGS - 1);
    }

    #[test]
    fn ignores_files_with_a_different_prefix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("unrelated.txt"), b"x").unwrap();

        prune_old_logs(dir.path(), LOG_FILE_PREFIX, MAX_RETAINED_LOGS);

        assert!(dir.path().join("unrelated.txt").exists());
    }
}
