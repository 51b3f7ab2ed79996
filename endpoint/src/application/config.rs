// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Local endpoint config (§6): a persisted JSON file plus two documented
//! environment-variable overrides. Absent fields default; unknown fields
//! are ignored — realized via `#[serde(default)]` on every field and
//! `serde_json`'s default behavior of ignoring unknown keys.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

fn default_server_url() -> String {
    "http://127.0.0.1:8443".to_string()
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_policy_sync_interval() -> u64 {
    60
}

fn default_agent_name() -> String {
    hostname_or_unknown()
}

pub(crate) fn hostname_or_unknown() -> String {
    std::env::var("HOSTNAME").or_else(|_| std::env::var("COMPUTERNAME")).unwrap_or_else(|_| "unknown-host".to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Generated once on first enrollment and persisted (§3 "process-
    /// generated on first enrollment and persisted in local config").
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default = "default_agent_name")]
    pub agent_name: String,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_policy_sync_interval")]
    pub policy_sync_interval_secs: u64,
    #[serde(default)]
    pub log_dir: Option<String>,
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    #[serde(default = "default_cache_capacity")]
    pub content_cache_capacity: usize,
    #[serde(default = "default_restoration_window_secs")]
    pub restoration_window_secs: i64,
    #[serde(default = "default_restored_grace_secs")]
    pub restored_grace_secs: i64,
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: i64,
    #[serde(default = "default_usb_transfer_restore_window_secs")]
    pub usb_transfer_restore_window_secs: i64,
}

fn default_max_file_size_mb() -> u64 {
    10
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_restoration_window_secs() -> i64 {
    600
}

fn default_restored_grace_secs() -> i64 {
    30
}

fn default_dedup_window_secs() -> i64 {
    2
}

/// §4.8 step 5: "schedule restoration to the source directory after a fixed
/// window (default 2 min)".
fn default_usb_transfer_restore_window_secs() -> i64 {
    120
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            agent_id: None,
            agent_name: default_agent_name(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            policy_sync_interval_secs: default_policy_sync_interval(),
            log_dir: None,
            max_file_size_mb: default_max_file_size_mb(),
            content_cache_capacity: default_cache_capacity(),
            restoration_window_secs: default_restoration_window_secs(),
            restored_grace_secs: default_restored_grace_secs(),
            dedup_window_secs: default_dedup_window_secs(),
            usb_transfer_restore_window_secs: default_usb_transfer_restore_window_secs(),
        }
    }
}

impl EndpointConfig {
    /// Loads the persisted JSON file if present, falling back to defaults,
    /// then applies the two documented env var overrides (§6).
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str(&raw)?
        } else {
            Self::default()
        };
        if let Ok(url) = std::env::var("CYBERSENTINEL_SERVER_URL") {
            config.server_url = url;
        }
        if let Ok(dir) = std::env::var("CYBERSENTINEL_LOG_DIR") {
            config.log_dir = Some(dir);
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("./logs"))
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_absent() {
        let config = EndpointConfig::load(Path::new("/nonexistent/cybersentinel.json")).unwrap();
        assert_eq!(config.heartbeat_interval_secs, 30);
        assert_eq!(config.policy_sync_interval_secs, 60);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cybersentinel.json");
        std::fs::write(&path, r#"{"server_url":"http://x","totally_unknown_field":123}"#).unwrap();
        let config = EndpointConfig::load(&path).unwrap();
        assert_eq!(config.server_url, "http://x");
    }
}
