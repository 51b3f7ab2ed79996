// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! USB File-Transfer Monitor (§4.8): differential scan detecting when a
//! file whose source is inside a monitored path appears on a removable
//! drive, then blocks/quarantines/alerts per the matching policy.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::RwLock;

use chrono::Utc;
use cybersentinel_core::domain::classifier::classify;
use cybersentinel_core::domain::event::{DetectedContentSummary, Event, EventAction, EventSubtype, EventType, SourceType};
use cybersentinel_core::domain::policy::{MonitoredEvent, Policy, PolicyAction};
use uuid::Uuid;

use super::usb_device::RemovableDriveLister;
use crate::application::uploader::UploaderHandle;
use crate::domain::PolicySnapshot;

struct DriveState {
    /// `(drive, filename) → on_usb_now` per §4.8 step 2.
    on_usb_now: HashMap<String, bool>,
    pre_existing: HashSet<String>,
}

pub struct UsbFileTransferMonitor {
    agent_id: cybersentinel_core::domain::agent::AgentId,
    snapshot: Arc<RwLock<Arc<PolicySnapshot>>>,
    uploader: UploaderHandle,
    lister: Box<dyn RemovableDriveLister>,
    drives: std::sync::Mutex<HashMap<String, DriveState>>,
    restore_window: chrono::Duration,
}

impl UsbFileTransferMonitor {
    pub fn new(
        agent_id: cybersentinel_core::domain::agent::AgentId,
        snapshot: Arc<RwLock<Arc<PolicySnapshot>>>,
        uploader: UploaderHandle,
        lister: Box<dyn RemovableDriveLister>,
        restore_window: chrono::Duration,
    ) -> Self {
        Self { agent_id, snapshot, uploader, lister, drives: std::sync::Mutex::new(HashMap::new()), restore_window }
    }

    fn snapshot(&self) -> Arc<PolicySnapshot> {
        Arc::clone(&self.snapshot.read().unwrap())
    }

    pub async fn run(self: Arc<Self>, shutdown: tokio_util::sync::CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => self.tick().await,
            }
        }
    }

    pub async fn tick(&self) {
        let snapshot = self.snapshot();
        if snapshot.usb_file_transfer.is_empty() {
            return;
        }
        let monitored_basenames = monitored_basenames(&snapshot);
        if monitored_basenames.is_empty() {
            return;
        }

        for drive in self.lister.list() {
            let Ok(files) = list_files(Path::new(&drive.mount_point)) else {
                // §4.8 step 6: drive inaccessible mid-scan — silently stop.
                continue;
            };
            let mut drives = self.drives.lock().unwrap();
            let state = drives.entry(drive.device_id.clone()).or_insert_with(|| DriveState {
                on_usb_now: HashMap::new(),
                pre_existing: files.iter().map(|f| f.file_name().unwrap().to_string_lossy().to_string()).collect(),
            });

            let current_names: HashSet<String> =
                files.iter().filter_map(|f| f.file_name().map(|n| n.to_string_lossy().to_string())).collect();

            for name in &current_names {
                let was_present = state.on_usb_now.get(name).copied().unwrap_or(false);
                let is_pre_existing = state.pre_existing.contains(name);
                if !was_present && !is_pre_existing {
                    if let Some(source_path) = monitored_basenames.get(name) {
                        self.handle_transfer(&snapshot, &drive.mount_point, name, source_path).await;
                    }
                }
                state.on_usb_now.insert(name.clone(), true);
            }
            for (name, present) in state.on_usb_now.iter_mut() {
                if !current_names.contains(name) {
                    *present = false;
                }
            }
        }
    }

    async fn handle_transfer(&self, snapshot: &PolicySnapshot, mount_point: &str, basename: &str, source_path: &Path) {
        let drive_file = Path::new(mount_point).join(basename);
        let source_exists = tokio::fs::metadata(source_path).await.is_ok();
        let transfer_type = if source_exists { TransferType::Copy } else { TransferType::Move };

        let Some(policy) = snapshot
            .usb_file_transfer
            .iter()
            .find(|p| match &p.config {
                cybersentinel_core::domain::policy::PolicyConfig::UsbFileTransferMonitoring(c) => {
                    c.monitored_paths.iter().any(|root| source_path.starts_with(root))
                }
                _ => false,
            })
        else {
            return;
        };

        let (outcome, detected) = self.enforce(policy, &drive_file, source_path, transfer_type).await;
        self.emit(source_path, basename, transfer_type, outcome, detected, policy);
    }

    async fn enforce(
        &self,
        policy: &Policy,
        drive_file: &Path,
        source_path: &Path,
        transfer_type: TransferType,
    ) -> (EventAction, cybersentinel_core::domain::classifier::ClassificationResult) {
        let cybersentinel_core::domain::policy::PolicyConfig::UsbFileTransferMonitoring(config) = &policy.config else {
            unreachable!("usb_file_transfer snapshot only holds this variant")
        };

        let detected = if !config.patterns_predefined.is_empty() || !config.patterns_custom.is_empty() {
            match tokio::fs::read(drive_file).await {
                Ok(bytes) => classify(&String::from_utf8_lossy(&bytes), MonitoredEvent::UsbFileTransfer, &[policy]),
                Err(_) => Default::default(),
            }
        } else {
            Default::default()
        };

        let action = match config.action {
            PolicyAction::Block => {
                // §4.8 block/move: copy back into the source directory
                // *first*, then remove the USB copy — reversed, the drive
                // file would be gone before the copy-back could read it.
                if transfer_type == TransferType::Move {
                    if let Some(parent) = source_path.parent() {
                        let _ = tokio::fs::create_dir_all(parent).await;
                    }
                    let _ = tokio::fs::copy(drive_file, source_path).await;
                }
                let _ = tokio::fs::remove_file(drive_file).await;
                match transfer_type {
                    TransferType::Copy => EventAction::BlockedCopy,
                    TransferType::Move => EventAction::BlockedMove,
                }
            }
            PolicyAction::Quarantine => {
                let quarantine_dir = config.quarantine_path.clone().unwrap_or_else(|| "./quarantine".to_string());
                let dest = Path::new(&quarantine_dir).join(format!(
                    "{}_{}",
                    Utc::now().timestamp_nanos_opt().unwrap_or_default(),
                    drive_file.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
                ));
                if tokio::fs::create_dir_all(&quarantine_dir).await.is_ok() && tokio::fs::rename(drive_file, &dest).await.is_ok() {
                    // §4.8 step 5: schedule restoration to the source
                    // directory after the configured window. If the source
                    // disappeared (move case), the quarantine file is the
                    // sole copy until restoration.
                    self.schedule_usb_restoration(source_path.to_path_buf(), dest);
                }
                match transfer_type {
                    TransferType::Copy => EventAction::QuarantinedCopy,
                    TransferType::Move => EventAction::QuarantinedMove,
                }
            }
            PolicyAction::Alert | PolicyAction::Log => EventAction::Alerted,
        };
        (action, detected)
    }

    /// Fire-and-forget restoration of a quarantined USB-transfer file back to
    /// its source directory, mirroring the Enforcer's own restoration
    /// scheduling (§9 "Quarantine scheduling" trade-off, documented in
    /// DESIGN.md: in-memory, lost on process exit).
    fn schedule_usb_restoration(&self, source_path: PathBuf, quarantine_path: PathBuf) {
        let delay = self.restore_window.to_std().unwrap_or(std::time::Duration::from_secs(120));
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(parent) = source_path.parent() {
                let _ = tokio::fs::create_dir_all(parent).await;
            }
            if let Err(e) = tokio::fs::rename(&quarantine_path, &source_path).await {
                tracing::warn!(path = %source_path.display(), error = %e, "failed to restore usb-quarantined file to source directory");
            }
        });
    }

    fn emit(
        &self,
        source_path: &Path,
        basename: &str,
        transfer_type: TransferType,
        action: EventAction,
        detected: cybersentinel_core::domain::classifier::ClassificationResult,
        policy: &Policy,
    ) {
        let event = Event {
            event_id: Uuid::new_v4(),
            agent_id: self.agent_id,
            source_type: SourceType::Agent,
            event_type: EventType::Usb,
            event_subtype: EventSubtype::UsbFileTransfer,
            severity: detected.severity.unwrap_or(policy.severity),
            action,
            file_path: Some(source_path.to_string_lossy().to_string()),
            file_name: Some(basename.to_string()),
            file_size: None,
            file_hash: None,
            data_types: detected.data_type_names(),
            detected_content: DetectedContentSummary { data_types: detected.data_types },
            matched_policies: vec![policy.id],
            total_matches: detected.total_matches,
            device_name: None,
            device_id: None,
            vendor_id: None,
            product_id: None,
            description: Some(format!("{transfer_type:?} transfer")),
            user_email: None,
            timestamp: Utc::now(),
            reevaluation: None,
        };
        self.uploader.enqueue(event, None);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransferType {
    Copy,
    Move,
}

fn monitored_basenames(snapshot: &PolicySnapshot) -> HashMap<String, PathBuf> {
    let mut out = HashMap::new();
    for policy in &snapshot.usb_file_transfer {
        let cybersentinel_core::domain::policy::PolicyConfig::UsbFileTransferMonitoring(config) = &policy.config else { continue };
        for root in &config.monitored_paths {
            if let Ok(entries) = std::fs::read_dir(root) {
                for entry in entries.flatten() {
                    if entry.path().is_file() {
                        if let Some(name) = entry.path().file_name() {
                            out.insert(name.to_string_lossy().to_string(), entry.path());
                        }
                    }
                }
            }
        }
    }
    out
}

fn list_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.path().is_file() {
            out.push(entry.path());
        }
    }
    Ok(out)
}
