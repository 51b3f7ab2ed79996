// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Filesystem Monitor (§4.5). Registers a recursive `notify` watcher per
//! monitored root, filters by policy/extension/subtype, de-duplicates
//! bursts, self-suppresses enforcer-owned paths, baselines existing files
//! into the original-content cache on startup, and hands matched content to
//! the shared Classifier before invoking the Enforcer.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::RwLock;

use chrono::Utc;
use cybersentinel_core::domain::classifier::classify;
use cybersentinel_core::domain::event::{DetectedContentSummary, Event, EventAction, EventSubtype, EventType, SourceType};
use cybersentinel_core::domain::policy::MonitoredEvent;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use uuid::Uuid;

use crate::application::dedup::DedupMap;
use crate::application::enforcer::{highest_priority_action, Enforcer, EnforcementOutcome};
use crate::application::uploader::UploaderHandle;
use crate::domain::{Clock, OriginalContentCache, PolicySnapshot, SuppressionSets};

pub struct FilesystemMonitor {
    agent_id: cybersentinel_core::domain::agent::AgentId,
    snapshot: Arc<RwLock<Arc<PolicySnapshot>>>,
    content_cache: Arc<OriginalContentCache>,
    suppression: Arc<SuppressionSets>,
    dedup: Arc<DedupMap>,
    enforcer: Arc<Enforcer>,
    uploader: UploaderHandle,
    clock: Arc<dyn Clock>,
    max_file_size_bytes: u64,
    dedup_window: chrono::Duration,
}

fn subtype_of(kind: &EventKind) -> Option<MonitoredEvent> {
    match kind {
        EventKind::Create(_) => Some(MonitoredEvent::FileCreated),
        EventKind::Modify(notify::event::ModifyKind::Data(_)) | EventKind::Modify(notify::event::ModifyKind::Any) => {
            Some(MonitoredEvent::FileModified)
        }
        EventKind::Remove(_) => Some(MonitoredEvent::FileDeleted),
        EventKind::Modify(notify::event::ModifyKind::Name(_)) => Some(MonitoredEvent::FileRenamed),
        _ => None,
    }
}

fn wire_subtype(subtype: MonitoredEvent) -> EventSubtype {
    match subtype {
        MonitoredEvent::FileCreated => EventSubtype::FileCreated,
        MonitoredEvent::FileModified => EventSubtype::FileModified,
        MonitoredEvent::FileDeleted => EventSubtype::FileDeleted,
        MonitoredEvent::FileRenamed => EventSubtype::FileRenamed,
        _ => EventSubtype::FileModified,
    }
}

impl FilesystemMonitor {
    pub fn new(
        agent_id: cybersentinel_core::domain::agent::AgentId,
        snapshot: Arc<RwLock<Arc<PolicySnapshot>>>,
        content_cache: Arc<OriginalContentCache>,
        suppression: Arc<SuppressionSets>,
        dedup: Arc<DedupMap>,
        enforcer: Arc<Enforcer>,
        uploader: UploaderHandle,
        clock: Arc<dyn Clock>,
        max_file_size_bytes: u64,
        dedup_window: chrono::Duration,
    ) -> Self {
        Self { agent_id, snapshot, content_cache, suppression, dedup, enforcer, uploader, clock, max_file_size_bytes, dedup_window }
    }

    fn snapshot(&self) -> Arc<PolicySnapshot> {
        Arc::clone(&self.snapshot.read().unwrap())
    }

    /// §4.5 step 5: "Baseline on startup" — recursively enumerate existing
    /// files under every monitored root matching the extension filter and
    /// deposit their bytes as the baseline. No event is emitted.
    pub async fn baseline(&self) {
        let snapshot = self.snapshot();
        let roots: std::collections::BTreeSet<String> = snapshot
            .file_system
            .iter()
            .chain(snapshot.file_transfer.iter())
            .filter_map(|p| match &p.config {
                cybersentinel_core::domain::policy::PolicyConfig::FileSystemMonitoring(c)
                | cybersentinel_core::domain::policy::PolicyConfig::FileTransferMonitoring(c) => Some(c.monitored_paths.clone()),
                _ => None,
            })
            .flatten()
            .collect();
        for root in roots {
            self.baseline_dir(Path::new(&root)).await;
        }
    }

    fn baseline_dir<'a>(&'a self, dir: &'a Path) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + 'a>> {
        Box::pin(async move {
            let Ok(mut entries) = tokio::fs::read_dir(dir).await else { return };
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if path.is_dir() {
                    self.baseline_dir(&path).await;
                    continue;
                }
                let path_str = path.to_string_lossy().to_string();
                if self.snapshot().file_policies_for_path(&path_str).is_empty() {
                    continue;
                }
                if let Ok(meta) = tokio::fs::metadata(&path).await {
                    if meta.len() > self.max_file_size_bytes {
                        continue;
                    }
                }
                if let Ok(bytes) = tokio::fs::read(&path).await {
                    self.content_cache.insert(path_str, bytes);
                }
            }
        })
    }

    /// Watches every monitored root with a recursive `notify` watcher and
    /// processes events until `shutdown` fires.
    pub async fn run(self: Arc<Self>, shutdown: tokio_util::sync::CancellationToken) {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let snapshot = self.snapshot();
        let roots: std::collections::BTreeSet<String> = snapshot
            .file_system
            .iter()
            .chain(snapshot.file_transfer.iter())
            .filter_map(|p| match &p.config {
                cybersentinel_core::domain::policy::PolicyConfig::FileSystemMonitoring(c)
                | cybersentinel_core::domain::policy::PolicyConfig::FileTransferMonitoring(c) => Some(c.monitored_paths.clone()),
                _ => None,
            })
            .flatten()
            .collect();

        let mut watcher: RecommendedWatcher = match notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        }) {
            Ok(w) => w,
            Err(e) => {
                tracing::error!(error = %e, "failed to create filesystem watcher");
                return;
            }
        };
        for root in &roots {
            if let Err(e) = watcher.watch(Path::new(root), RecursiveMode::Recursive) {
                tracing::warn!(path = root, error = %e, "failed to watch monitored path");
            }
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                maybe_event = rx.recv() => {
                    match maybe_event {
                        Some(event) => {
                            for path in &event.paths {
                                self.handle_raw_event(path, &event.kind).await;
                            }
                        }
                        None => return,
                    }
                }
            }
        }
    }

    /// The per-event pipeline, §4.5 steps 1-8 followed by classification and
    /// enforcement. Exposed separately from `run` so tests can drive it
    /// without a live OS watcher.
    pub async fn handle_raw_event(&self, path: &PathBuf, kind: &EventKind) {
        let Some(subtype) = subtype_of(kind) else { return };
        let path_str = path.to_string_lossy().to_string();

        // Step 4: self-suppress enforcer-owned paths.
        if self.suppression.should_suppress(&path_str) {
            return;
        }

        let snapshot = self.snapshot();
        let matching = snapshot.file_policies_for_path(&path_str);
        let matching: Vec<_> = matching.into_iter().filter(|p| p.config.matches_subtype(subtype)).collect();
        if matching.is_empty() {
            return;
        }

        // Step 3: de-duplicate identical (path, subtype) within the window.
        if self.dedup.should_suppress(&path_str, subtype.wire(), self.dedup_window, self.clock.as_ref()) {
            return;
        }

        // Step 5/6/7/8: content acquisition rules.
        let content_bytes = match subtype {
            MonitoredEvent::FileCreated => {
                // Insert a short delay to let the writer finish (§4.5: "must
                // not block an event beyond 500 ms").
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                let bytes = read_capped(path, self.max_file_size_bytes).await;
                if let Some(b) = &bytes {
                    self.content_cache.insert(path_str.clone(), b.clone());
                }
                bytes
            }
            MonitoredEvent::FileModified | MonitoredEvent::FileRenamed => {
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                read_capped(path, self.max_file_size_bytes).await
            }
            MonitoredEvent::FileDeleted => self.content_cache.get(&path_str),
            _ => None,
        };

        let Some(bytes) = content_bytes else {
            return;
        };
        let content = String::from_utf8_lossy(&bytes);

        let result = classify(&content, subtype, &matching);
        if result.is_empty() {
            return;
        }

        // §4.5: "invoke the Enforcer with the highest-severity action among
        // matched policies" — only the policies the Classifier actually
        // matched, not every policy that merely passed the path/ext/subtype
        // filter (a co-located `log` policy must not drive enforcement for a
        // `block`/`quarantine` policy whose patterns didn't match).
        let matched: Vec<_> = matching.iter().filter(|p| result.matched_policies.contains(&p.id)).collect();

        let effective_action =
            highest_priority_action(&matched.iter().map(|p| (p.config.action(), p.priority)).collect::<Vec<_>>());
        let Some(effective_action) = effective_action else { return };

        let quarantine_dir = matched
            .iter()
            .find_map(|p| match &p.config {
                cybersentinel_core::domain::policy::PolicyConfig::FileSystemMonitoring(c) => c.quarantine_path.clone(),
                _ => None,
            })
            .unwrap_or_else(|| "./quarantine".to_string());

        let outcome = self.enforce(effective_action, subtype, &path_str, &quarantine_dir).await;
        self.emit_event(path, subtype, outcome, result);
    }

    async fn enforce(
        &self,
        action: cybersentinel_core::domain::policy::PolicyAction,
        subtype: MonitoredEvent,
        path: &str,
        quarantine_dir: &str,
    ) -> EnforcementOutcome {
        use cybersentinel_core::domain::policy::PolicyAction as PA;
        match (action, subtype) {
            (PA::Log, _) => EnforcementOutcome::Logged,
            (PA::Alert, _) => EnforcementOutcome::Alerted,
            (PA::Quarantine, MonitoredEvent::FileDeleted) => match self.enforcer.quarantine_on_delete(path, quarantine_dir).await {
                Ok(()) => EnforcementOutcome::QuarantinedOnDelete,
                Err(e) => {
                    tracing::error!(path, error = %e, "quarantine-on-delete failed");
                    EnforcementOutcome::QuarantineFailed
                }
            },
            (PA::Quarantine, _) => match self.enforcer.quarantine(path, quarantine_dir).await {
                Ok(_) => EnforcementOutcome::Quarantined,
                Err(e) => {
                    tracing::error!(path, error = %e, "quarantine failed");
                    EnforcementOutcome::QuarantineFailed
                }
            },
            (PA::Block, _) => match self.enforcer.block_delete(path).await {
                Ok(()) => EnforcementOutcome::Deleted,
                Err(e) => {
                    tracing::error!(path, error = %e, "block-delete failed");
                    EnforcementOutcome::BlockFailed
                }
            },
        }
    }

    fn emit_event(
        &self,
        path: &Path,
        subtype: MonitoredEvent,
        outcome: EnforcementOutcome,
        classification: cybersentinel_core::domain::classifier::ClassificationResult,
    ) {
        let event = Event {
            event_id: Uuid::new_v4(),
            agent_id: self.agent_id,
            source_type: SourceType::Agent,
            event_type: EventType::File,
            event_subtype: wire_subtype(subtype),
            severity: classification.severity.unwrap_or(cybersentinel_core::domain::policy::Severity::Low),
            action: EventAction::from(outcome),
            file_path: Some(path.to_string_lossy().to_string()),
            file_name: path.file_name().map(|n| n.to_string_lossy().to_string()),
            file_size: None,
            file_hash: None,
            data_types: classification.data_type_names(),
            detected_content: DetectedContentSummary { data_types: classification.data_types },
            matched_policies: classification.matched_policies,
            total_matches: classification.total_matches,
            device_name: None,
            device_id: None,
            vendor_id: None,
            product_id: None,
            description: None,
            user_email: None,
            timestamp: Utc::now(),
            reevaluation: None,
        };
        self.uploader.enqueue(event, None);
    }
}

async fn read_capped(path: &Path, max_bytes: u64) -> Option<Vec<u8>> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    if meta.len() > max_bytes {
        return None;
    }
    tokio::fs::read(path).await.ok()
}
