// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! The endpoint's in-memory view of the policy bundle it last installed
//! (§4.4 "First sync"). Reconstructs full `cybersentinel_core` domain
//! `Policy` values from the wire bundle so that the *same* `classify`
//! function the manager calls for re-evaluation (§4.3 step 3) runs here too
//! — Testable Property 6, "classification purity", requires these to be
//! literally the same code path, not a parallel reimplementation.
//!
//! Immutable once built; the policy sync loop builds a new snapshot and
//! atomically swaps it in (§5: "writer publishes a new snapshot atomically
//! (swap)").

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use cybersentinel_core::domain::bundle::{PolicyBundle, PolicyWire};
use cybersentinel_core::domain::policy::{
    ClipboardMonitoringConfig, FileMonitoringConfig, MonitoredEvent, Policy, PolicyConfig, PolicyId,
    UsbDeviceEvents, UsbDeviceMonitoringConfig, UsbFileTransferMonitoringConfig,
};

fn str_vec(v: &serde_json::Value, key: &str) -> BTreeSet<String> {
    v.get(key).and_then(|x| x.as_array()).map(|a| a.iter().filter_map(|s| s.as_str().map(String::from)).collect()).unwrap_or_default()
}

fn str_list(v: &serde_json::Value, key: &str) -> Vec<String> {
    v.get(key).and_then(|x| x.as_array()).map(|a| a.iter().filter_map(|s| s.as_str().map(String::from)).collect()).unwrap_or_default()
}

fn monitored_events(v: &serde_json::Value, key: &str) -> Vec<MonitoredEvent> {
    v.get(key)
        .and_then(|x| x.as_array())
        .map(|a| a.iter().filter_map(|s| s.as_str().and_then(MonitoredEvent::parse)).collect())
        .unwrap_or_default()
}

fn patterns(v: &serde_json::Value) -> (Vec<String>, Vec<String>) {
    let p = v.get("patterns").cloned().unwrap_or_default();
    (str_list(&p, "predefined"), str_list(&p, "custom"))
}

/// Parses one `PolicyWire` back into a domain `Policy`, mirroring
/// `bundle::config_to_json`'s field names in reverse. Returns `None` on a
/// malformed config — the agent "simply ignores unknown types" (§4.2 edge
/// cases) extended here to "ignores malformed wire payloads", logged by the
/// caller.
fn wire_to_policy(w: &PolicyWire, build: impl FnOnce(&serde_json::Value) -> Option<PolicyConfig>) -> Option<Policy> {
    let id = PolicyId(uuid::Uuid::parse_str(&w.id).ok()?);
    let config = build(&w.config)?;
    let now: DateTime<Utc> = Utc::now();
    Some(Policy {
        id,
        name: w.name.clone(),
        description: String::new(),
        severity: w.severity,
        priority: 0,
        enabled: w.enabled,
        config,
        created_at: now,
        updated_at: now,
    })
}

fn file_like(w: &PolicyWire) -> Option<FileMonitoringConfig> {
    let (predefined, custom) = patterns(&w.config);
    Some(FileMonitoringConfig {
        monitored_paths: str_vec(&w.config, "monitoredPaths"),
        file_extensions: str_vec(&w.config, "fileExtensions"),
        monitored_events: monitored_events(&w.config, "monitoredEvents"),
        patterns_predefined: predefined,
        patterns_custom: custom,
        action: w.action,
        quarantine_path: w.config.get("quarantinePath").and_then(|v| v.as_str()).map(String::from),
        min_match_count: w.config.get("minMatchCount").and_then(|v| v.as_u64()).unwrap_or(1) as u32,
    })
}

#[derive(Debug, Clone, Default)]
pub struct PolicySnapshot {
    pub version: Option<String>,
    pub file_system: Vec<Policy>,
    pub file_transfer: Vec<Policy>,
    pub clipboard: Vec<Policy>,
    pub usb_device: Vec<Policy>,
    pub usb_file_transfer: Vec<Policy>,
}

impl PolicySnapshot {
    pub fn from_bundle(bundle: &PolicyBundle) -> Self {
        let file_system = bundle
            .policies
            .file_system_monitoring
            .iter()
            .filter_map(|w| wire_to_policy(w, |_| file_like(w).map(PolicyConfig::FileSystemMonitoring)))
            .collect();
        let file_transfer = bundle
            .policies
            .file_transfer_monitoring
            .iter()
            .filter_map(|w| wire_to_policy(w, |_| file_like(w).map(PolicyConfig::FileTransferMonitoring)))
            .collect();
        let clipboard = bundle
            .policies
            .clipboard_monitoring
            .iter()
            .filter_map(|w| {
                wire_to_policy(w, |cfg| {
                    let (predefined, custom) = patterns(cfg);
                    Some(PolicyConfig::ClipboardMonitoring(ClipboardMonitoringConfig {
                        patterns_predefined: predefined,
                        patterns_custom: custom,
                        action: w.action,
                        monitored_events: monitored_events(cfg, "monitoredEvents"),
                        poll_interval_seconds: cfg.get("pollIntervalSeconds").and_then(|v| v.as_u64()).unwrap_or(2) as u32,
                    }))
                })
            })
            .collect();
        let usb_device = bundle
            .policies
            .usb_device_monitoring
            .iter()
            .filter_map(|w| {
                wire_to_policy(w, |cfg| {
                    let events = monitored_events(cfg, "monitoredEvents");
                    Some(PolicyConfig::UsbDeviceMonitoring(UsbDeviceMonitoringConfig {
                        events: UsbDeviceEvents {
                            connect: events.contains(&MonitoredEvent::UsbConnect),
                            disconnect: events.contains(&MonitoredEvent::UsbDisconnect),
                            file_transfer: events.contains(&MonitoredEvent::UsbFileTransfer),
                        },
                        action: w.action,
                    }))
                })
            })
            .collect();
        let usb_file_transfer = bundle
            .policies
            .usb_file_transfer_monitoring
            .iter()
            .filter_map(|w| {
                wire_to_policy(w, |cfg| {
                    let (predefined, custom) = patterns(cfg);
                    Some(PolicyConfig::UsbFileTransferMonitoring(UsbFileTransferMonitoringConfig {
                        monitored_paths: str_vec(cfg, "monitoredPaths"),
                        action: w.action,
                        quarantine_path: cfg.get("quarantinePath").and_then(|v| v.as_str()).map(String::from),
                        patterns_predefined: predefined,
                        patterns_custom: custom,
                    }))
                })
            })
            .collect();

        Self { version: Some(bundle.version.clone()), file_system, file_transfer, clipboard, usb_device, usb_file_transfer }
    }

    pub fn has_file_policies(&self) -> bool {
        !self.file_system.is_empty() || !self.file_transfer.is_empty()
    }

    pub fn has_clipboard_policies(&self) -> bool {
        !self.clipboard.is_empty()
    }

    pub fn has_usb_device_policies(&self) -> bool {
        !self.usb_device.is_empty()
    }

    pub fn has_usb_transfer_policies(&self) -> bool {
        !self.usb_file_transfer.is_empty()
    }

    /// `allow_events = any(has_*_policies)` (§4.4).
    pub fn allow_events(&self) -> bool {
        self.has_file_policies() || self.has_clipboard_policies() || self.has_usb_device_policies() || self.has_usb_transfer_policies()
    }

    /// §4.7: "a flag `usb_blocking_active`... derived from policy set
    /// membership, updated atomically on bundle swap" — true iff any enabled
    /// `usb_device_monitoring` policy's effective action is `block`.
    pub fn usb_blocking_active(&self) -> bool {
        self.usb_device.iter().any(|p| p.enabled && p.config.action() == cybersentinel_core::domain::policy::PolicyAction::Block)
    }

    /// All file-family policies (system + transfer) whose `monitoredPath` is
    /// a prefix of `path` and whose extension filter matches (§4.5 step 1).
    pub fn file_policies_for_path(&self, path: &str) -> Vec<&Policy> {
        let ext = std::path::Path::new(path).extension().map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()));
        self.file_system
            .iter()
            .chain(self.file_transfer.iter())
            .filter(|p| match &p.config {
                PolicyConfig::FileSystemMonitoring(c) | PolicyConfig::FileTransferMonitoring(c) => {
                    c.monitored_paths.iter().any(|root| path.starts_with(root.as_str()))
                        && (c.file_extensions.is_empty() || ext.as_ref().is_some_and(|e| c.file_extensions.contains(e)))
                }
                _ => false,
            })
            .collect()
    }
}
