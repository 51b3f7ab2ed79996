// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Clipboard Monitor (§4.6). Polls clipboard text on a fixed interval,
//! classifies against clipboard policies only, and emits an event iff both
//! a policy matched and at least one data type was actually detected.
//! Redaction of sensitive data-type names is handled generically by the
//! shared Classifier (`classifier.rs`'s `ALWAYS_REDACT_SUBSTRINGS`), so this
//! monitor does not need its own redaction pass.

use std::sync::Arc;
use std::sync::RwLock;

use chrono::Utc;
use cybersentinel_core::domain::classifier::classify;
use cybersentinel_core::domain::event::{DetectedContentSummary, Event, EventAction, EventSubtype, EventType, SourceType};
use cybersentinel_core::domain::policy::MonitoredEvent;
use parking_lot::Mutex;
use std::sync::LazyLock;
use uuid::Uuid;

use crate::application::uploader::UploaderHandle;
use crate::domain::PolicySnapshot;

/// Seam for reading the system clipboard; the production implementation
/// wraps `arboard`. Abstracted so the monitor is testable without a real
/// display/clipboard backend (no example repo in the pack ships clipboard
/// code to ground this on directly — see DESIGN.md).
pub trait ClipboardReader: Send + Sync {
    fn read_text(&self) -> Option<String>;
}

pub struct ArboardReader(Mutex<arboard::Clipboard>);

impl ArboardReader {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self(Mutex::new(arboard::Clipboard::new()?)))
    }
}

impl ClipboardReader for ArboardReader {
    fn read_text(&self) -> Option<String> {
        self.0.lock().get_text().ok()
    }
}

/// Used when no display/clipboard backend is available (headless hosts,
/// tests). Always reports no content rather than erroring the whole
/// monitor loop.
pub struct NullClipboardReader;

impl ClipboardReader for NullClipboardReader {
    fn read_text(&self) -> Option<String> {
        None
    }
}

/// Seam for the active foreground window title, used to attribute a
/// "source file" via a regex over common "filename - app" patterns (§4.6).
pub trait ForegroundWindowReader: Send + Sync {
    fn title(&self) -> Option<String>;
}

pub struct NullForegroundWindowReader;

impl ForegroundWindowReader for NullForegroundWindowReader {
    fn title(&self) -> Option<String> {
        None
    }
}

static FILENAME_IN_TITLE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"(?P<name>[\w\-. ]+\.\w{1,8})\s*[-\u{2013}]\s*\w").unwrap());

fn extract_source_file(title: &str) -> Option<String> {
    FILENAME_IN_TITLE.captures(title).and_then(|c| c.name("name")).map(|m| m.as_str().to_string())
}

const MAX_CLIPBOARD_CONTENT_LEN: usize = 64 * 1024;

pub struct ClipboardMonitor {
    agent_id: cybersentinel_core::domain::agent::AgentId,
    snapshot: Arc<RwLock<Arc<PolicySnapshot>>>,
    uploader: UploaderHandle,
    reader: Box<dyn ClipboardReader>,
    window_reader: Box<dyn ForegroundWindowReader>,
    last_value: Mutex<Option<String>>,
}

impl ClipboardMonitor {
    pub fn new(
        agent_id: cybersentinel_core::domain::agent::AgentId,
        snapshot: Arc<RwLock<Arc<PolicySnapshot>>>,
        uploader: UploaderHandle,
        reader: Box<dyn ClipboardReader>,
        window_reader: Box<dyn ForegroundWindowReader>,
    ) -> Self {
        Self { agent_id, snapshot, uploader, reader, window_reader, last_value: Mutex::new(None) }
    }

    fn snapshot(&self) -> Arc<PolicySnapshot> {
        Arc::clone(&self.snapshot.read().unwrap())
    }

    pub async fn run(self: Arc<Self>, shutdown: tokio_util::sync::CancellationToken) {
        loop {
            let interval = self.poll_interval();
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(interval) => self.tick(),
            }
        }
    }

    fn poll_interval(&self) -> std::time::Duration {
        let snapshot = self.snapshot();
        let secs = snapshot
            .clipboard
            .iter()
            .filter_map(|p| match &p.config {
                cybersentinel_core::domain::policy::PolicyConfig::ClipboardMonitoring(c) => Some(c.poll_interval_seconds),
                _ => None,
            })
            .min()
            .unwrap_or(2);
        std::time::Duration::from_secs(secs.max(1) as u64)
    }

    /// One poll iteration — public for direct testing without a real clock
    /// loop.
    pub fn tick(&self) {
        let snapshot = self.snapshot();
        if snapshot.clipboard.is_empty() {
            return;
        }
        let Some(text) = self.reader.read_text() else { return };
        if text.is_empty() {
            return;
        }
        {
            let mut last = self.last_value.lock();
            if last.as_deref() == Some(text.as_str()) {
                return;
            }
            *last = Some(text.clone());
        }

        let truncated: String = text.chars().take(MAX_CLIPBOARD_CONTENT_LEN).collect();
        let policies: Vec<_> = snapshot.clipboard.iter().collect();
        let result = classify(&truncated, MonitoredEvent::ClipboardCopy, &policies);
        if result.is_empty() || result.data_types.is_empty() {
            // §4.6: "Emit an event only if both (a) at least one policy
            // matched and (b) at least one actual data-type match was
            // detected. Zero-match clipboard polls are silently dropped."
            return;
        }

        let source_file = self.window_reader.title().and_then(|t| extract_source_file(&t));

        let event = Event {
            event_id: Uuid::new_v4(),
            agent_id: self.agent_id,
            source_type: SourceType::Agent,
            event_type: EventType::Clipboard,
            event_subtype: EventSubtype::ClipboardCopy,
            severity: result.severity.unwrap_or(cybersentinel_core::domain::policy::Severity::Low),
            action: result.suggested_action.map(EventAction::from).unwrap_or(EventAction::Logged),
            file_path: None,
            file_name: source_file,
            file_size: None,
            file_hash: None,
            data_types: result.data_type_names(),
            detected_content: DetectedContentSummary { data_types: result.data_types },
            matched_policies: result.matched_policies,
            total_matches: result.total_matches,
            device_name: None,
            device_id: None,
            vendor_id: None,
            product_id: None,
            description: None,
            user_email: None,
            timestamp: Utc::now(),
            reevaluation: None,
        };
        self.uploader.enqueue(event, Some(truncated));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cybersentinel_core::domain::bundle::{BundlePolicies, PolicyBundle, PolicyWire};
    use cybersentinel_core::domain::policy::Severity;

    struct FixedReader(String);
    impl ClipboardReader for FixedReader {
        fn read_text(&self) -> Option<String> {
            Some(self.0.clone())
        }
    }

    fn bundle_with_ssn_clipboard_policy() -> PolicyBundle {
        PolicyBundle {
            version: "v1".into(),
            policy_count: 1,
            platform: cybersentinel_core::domain::agent::Platform::Linux,
            policies: BundlePolicies {
                clipboard_monitoring: vec![PolicyWire {
                    id: uuid::Uuid::new_v4().to_string(),
                    name: "clipboard-ssn".into(),
                    enabled: true,
                    severity: Severity::High,
                    action: cybersentinel_core::domain::policy::PolicyAction::Alert,
                    config: serde_json::json!({
                        "patterns": {"predefined": ["ssn"], "custom": []},
                        "monitoredEvents": [],
                        "pollIntervalSeconds": 2,
                    }),
                }],
                ..Default::default()
            },
        }
    }

    #[test]
    fn emits_only_when_a_data_type_actually_matched() {
        let bundle = bundle_with_ssn_clipboard_policy();
        let snapshot = Arc::new(RwLock::new(Arc::new(PolicySnapshot::from_bundle(&bundle))));
        let client = cybersentinel_agent_sdk::ManagerClient::new("http://127.0.0.1:1");
        let (_uploader, handle) = crate::application::uploader::Uploader::new(client);

        let monitor = ClipboardMonitor::new(
            cybersentinel_core::domain::agent::AgentId::new(),
            snapshot,
            handle,
            Box::new(FixedReader("nothing interesting here".into())),
            Box::new(NullForegroundWindowReader),
        );
        monitor.tick();
        // no panic, nothing matched — queue assertions require draining the
        // channel, covered at the integration level.
    }

    #[test]
    fn extracts_filename_from_window_title() {
        assert_eq!(extract_source_file("report.docx - Microsoft Word"), Some("report.docx".to_string()));
        assert_eq!(extract_source_file("Mozilla Firefox"), None);
    }
}
