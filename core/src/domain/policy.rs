// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Policy aggregate (BC-2 Policy Store). One record per configured detection
//! rule; `config` is a tagged variant over the closed set of `PolicyType`s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyId(pub Uuid);

impl PolicyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PolicyId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PolicyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyType {
    FileSystemMonitoring,
    ClipboardMonitoring,
    UsbDeviceMonitoring,
    UsbFileTransferMonitoring,
    FileTransferMonitoring,
    CloudStorageMonitoring,
}

impl PolicyType {
    pub fn wire_key(self) -> &'static str {
        match self {
            PolicyType::FileSystemMonitoring => "file_system_monitoring",
            PolicyType::ClipboardMonitoring => "clipboard_monitoring",
            PolicyType::UsbDeviceMonitoring => "usb_device_monitoring",
            PolicyType::UsbFileTransferMonitoring => "usb_file_transfer_monitoring",
            PolicyType::FileTransferMonitoring => "file_transfer_monitoring",
            PolicyType::CloudStorageMonitoring => "cloud_storage_monitoring",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Ordered `log < alert < quarantine < block` so "highest wins" across
/// multiple matched policies on one event is simply `.max()` (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyAction {
    Log,
    Alert,
    Quarantine,
    Block,
}

impl std::fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PolicyAction::Log => "log",
            PolicyAction::Alert => "alert",
            PolicyAction::Quarantine => "quarantine",
            PolicyAction::Block => "block",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoredEvent {
    FileCreated,
    FileModified,
    FileDeleted,
    FileRenamed,
    ClipboardCopy,
    UsbConnect,
    UsbDisconnect,
    UsbFileTransfer,
    /// Legacy `"all"` / `"*"` wildcard.
    All,
}

impl MonitoredEvent {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "file_created" => MonitoredEvent::FileCreated,
            "file_modified" => MonitoredEvent::FileModified,
            "file_deleted" => MonitoredEvent::FileDeleted,
            "file_renamed" => MonitoredEvent::FileRenamed,
            "clipboard_copy" => MonitoredEvent::ClipboardCopy,
            "usb_connect" => MonitoredEvent::UsbConnect,
            "usb_disconnect" => MonitoredEvent::UsbDisconnect,
            "usb_file_transfer" => MonitoredEvent::UsbFileTransfer,
            "all" | "*" => MonitoredEvent::All,
            _ => return None,
        })
    }

    pub fn wire(self) -> &'static str {
        match self {
            MonitoredEvent::FileCreated => "file_created",
            MonitoredEvent::FileModified => "file_modified",
            MonitoredEvent::FileDeleted => "file_deleted",
            MonitoredEvent::FileRenamed => "file_renamed",
            MonitoredEvent::ClipboardCopy => "clipboard_copy",
            MonitoredEvent::UsbConnect => "usb_connect",
            MonitoredEvent::UsbDisconnect => "usb_disconnect",
            MonitoredEvent::UsbFileTransfer => "usb_file_transfer",
            MonitoredEvent::All => "all",
        }
    }
}

/// `monitoredPaths` / `fileExtensions` / `patterns` / `action` shared by
/// `file_system_monitoring` and `file_transfer_monitoring` (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMonitoringConfig {
    pub monitored_paths: BTreeSet<String>,
    /// Lowercased, leading-dot extensions. Empty means "all extensions".
    pub file_extensions: BTreeSet<String>,
    /// Empty `monitored_events` with non-empty other config means "all
    /// events" (legacy backward-compatibility rule, §3 and §4.5 step 2).
    pub monitored_events: Vec<MonitoredEvent>,
    pub patterns_predefined: Vec<String>,
    pub patterns_custom: Vec<String>,
    pub action: PolicyAction,
    pub quarantine_path: Option<String>,
    pub min_match_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardMonitoringConfig {
    pub patterns_predefined: Vec<String>,
    pub patterns_custom: Vec<String>,
    pub action: PolicyAction,
    pub monitored_events: Vec<MonitoredEvent>,
    pub poll_interval_seconds: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UsbDeviceEvents {
    pub connect: bool,
    pub disconnect: bool,
    pub file_transfer: bool,
}

impl UsbDeviceEvents {
    pub fn to_monitored_events(self) -> Vec<MonitoredEvent> {
        let mut out = Vec::new();
        if self.connect {
            out.push(MonitoredEvent::UsbConnect);
        }
        if self.disconnect {
            out.push(MonitoredEvent::UsbDisconnect);
        }
        if self.file_transfer {
            out.push(MonitoredEvent::UsbFileTransfer);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbDeviceMonitoringConfig {
    pub events: UsbDeviceEvents,
    /// `log` / `alert` / `block` only; validated on write.
    pub action: PolicyAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbFileTransferMonitoringConfig {
    pub monitored_paths: BTreeSet<String>,
    /// `alert` / `quarantine` / `block` only; validated on write.
    pub action: PolicyAction,
    pub quarantine_path: Option<String>,
    /// Optional content-aware blocking (§4.8): when non-empty, the monitor
    /// classifies file contents in addition to matching on path.
    #[serde(default)]
    pub patterns_predefined: Vec<String>,
    #[serde(default)]
    pub patterns_custom: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PolicyConfig {
    FileSystemMonitoring(FileMonitoringConfig),
    FileTransferMonitoring(FileMonitoringConfig),
    ClipboardMonitoring(ClipboardMonitoringConfig),
    UsbDeviceMonitoring(UsbDeviceMonitoringConfig),
    UsbFileTransferMonitoring(UsbFileTransferMonitoringConfig),
}

impl PolicyConfig {
    pub fn policy_type(&self) -> PolicyType {
        match self {
            PolicyConfig::FileSystemMonitoring(_) => PolicyType::FileSystemMonitoring,
            PolicyConfig::FileTransferMonitoring(_) => PolicyType::FileTransferMonitoring,
            PolicyConfig::ClipboardMonitoring(_) => PolicyType::ClipboardMonitoring,
            PolicyConfig::UsbDeviceMonitoring(_) => PolicyType::UsbDeviceMonitoring,
            PolicyConfig::UsbFileTransferMonitoring(_) => PolicyType::UsbFileTransferMonitoring,
        }
    }

    pub fn action(&self) -> PolicyAction {
        match self {
            PolicyConfig::FileSystemMonitoring(c) | PolicyConfig::FileTransferMonitoring(c) => c.action,
            PolicyConfig::ClipboardMonitoring(c) => c.action,
            PolicyConfig::UsbDeviceMonitoring(c) => c.action,
            PolicyConfig::UsbFileTransferMonitoring(c) => c.action,
        }
    }

    /// Invariant: `config` schema is validated against `type` on write (§3).
    /// Policies that fail validation are excluded at bundle-assembly time,
    /// not rejected at write time with a hard error (§4.2 edge cases) — so
    /// this returns a `Result` the policy service surfaces as
    /// `InvalidPolicyConfig` on create/update, while the bundle assembler
    /// calls it defensively and only logs+excludes.
    pub fn validate(&self) -> Result<(), PolicyConfigError> {
        match self {
            PolicyConfig::FileSystemMonitoring(c) | PolicyConfig::FileTransferMonitoring(c) => {
                if c.monitored_paths.is_empty() {
                    return Err(PolicyConfigError::Invalid("monitoredPaths must not be empty".into()));
                }
                if c.min_match_count == 0 {
                    return Err(PolicyConfigError::Invalid("minMatchCount must be >= 1".into()));
                }
                Ok(())
            }
            PolicyConfig::ClipboardMonitoring(c) => {
                if c.poll_interval_seconds == 0 {
                    return Err(PolicyConfigError::Invalid("pollIntervalSeconds must be >= 1".into()));
                }
                Ok(())
            }
            PolicyConfig::UsbDeviceMonitoring(c) => {
                if !matches!(c.action, PolicyAction::Log | PolicyAction::Alert | PolicyAction::Block) {
                    return Err(PolicyConfigError::Invalid(
                        "usb_device_monitoring action must be log, alert, or block".into(),
                    ));
                }
                Ok(())
            }
            PolicyConfig::UsbFileTransferMonitoring(c) => {
                if !matches!(c.action, PolicyAction::Alert | PolicyAction::Quarantine | PolicyAction::Block) {
                    return Err(PolicyConfigError::Invalid(
                        "usb_file_transfer_monitoring action must be alert, quarantine, or block".into(),
                    ));
                }
                if c.action == PolicyAction::Quarantine && c.quarantine_path.is_none() {
                    return Err(PolicyConfigError::Invalid(
                        "quarantinePath is required when action is quarantine".into(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Whether `subtype` is evaluated against this config per §4.5 step 2 /
    /// Testable Property 7: present in `monitored_events`, or `all`/`*`, or
    /// `monitored_events` is empty while some other config is present
    /// (legacy "all").
    pub fn matches_subtype(&self, subtype: MonitoredEvent) -> bool {
        let events: &[MonitoredEvent] = match self {
            PolicyConfig::FileSystemMonitoring(c) | PolicyConfig::FileTransferMonitoring(c) => &c.monitored_events,
            PolicyConfig::ClipboardMonitoring(c) => &c.monitored_events,
            PolicyConfig::UsbDeviceMonitoring(c) => {
                return c.events.to_monitored_events().iter().any(|e| *e == subtype);
            }
            PolicyConfig::UsbFileTransferMonitoring(_) => return true,
        };
        if events.is_empty() {
            return true;
        }
        events.iter().any(|e| *e == subtype || *e == MonitoredEvent::All)
    }
}

#[derive(Debug, Error)]
pub enum PolicyConfigError {
    #[error("invalid policy config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,
    pub name: String,
    pub description: String,
    pub severity: Severity,
    /// Lower value = higher precedence (tie-break in §4.9).
    pub priority: i32,
    pub enabled: bool,
    pub config: PolicyConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Policy {
    pub fn policy_type(&self) -> PolicyType {
        self.config.policy_type()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyStats {
    pub total: u64,
    pub enabled: u64,
    pub disabled: u64,
    pub by_type: std::collections::BTreeMap<String, u64>,
}
