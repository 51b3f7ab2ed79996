// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Event aggregate (§3 "Event"). Immutable once ingested; `event_id`
//! uniqueness is the idempotency key for the whole pipeline (Testable
//! Property 3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::classifier::ClassificationResult;
use crate::domain::policy::{PolicyAction, PolicyId, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Agent,
    Cloud,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    File,
    Clipboard,
    Usb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSubtype {
    FileCreated,
    FileModified,
    FileDeleted,
    FileRenamed,
    ClipboardCopy,
    UsbConnect,
    UsbDisconnect,
    UsbFileTransfer,
    UsbBlocked,
    TransferBlocked,
}

/// Superset of [`PolicyAction`] plus terminal enforcement outcomes (§3, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    Log,
    Alert,
    Quarantined,
    QuarantinedOnDelete,
    Deleted,
    Blocked,
    UsbBlocked,
    BlockedCopy,
    BlockedMove,
    QuarantinedCopy,
    QuarantinedMove,
    Alerted,
    Logged,
    QuarantineFailed,
    BlockFailed,
}

impl From<PolicyAction> for EventAction {
    fn from(action: PolicyAction) -> Self {
        match action {
            PolicyAction::Log => EventAction::Logged,
            PolicyAction::Alert => EventAction::Alert,
            PolicyAction::Quarantine => EventAction::Quarantined,
            PolicyAction::Block => EventAction::Blocked,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectedContentSummary {
    pub data_types: Vec<crate::domain::classifier::DetectedDataType>,
}

/// The manager's re-evaluation result, stored alongside the agent-reported
/// view (§4.3 step 3, §9 "Re-evaluation on the manager").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reevaluation {
    pub matched_policies: Vec<PolicyId>,
    pub severity: Option<Severity>,
    pub suggested_action: Option<PolicyAction>,
    pub total_matches: u32,
}

impl Reevaluation {
    pub fn from_classification(result: &ClassificationResult) -> Self {
        Self {
            matched_policies: result.matched_policies.clone(),
            severity: result.severity,
            suggested_action: result.suggested_action,
            total_matches: result.total_matches,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: Uuid,
    pub agent_id: crate::domain::agent::AgentId,
    pub source_type: SourceType,
    pub event_type: EventType,
    pub event_subtype: EventSubtype,
    pub severity: Severity,
    pub action: EventAction,
    pub file_path: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub file_hash: Option<String>,
    pub detected_content: DetectedContentSummary,
    pub data_types: Vec<String>,
    pub matched_policies: Vec<PolicyId>,
    pub total_matches: u32,
    pub device_name: Option<String>,
    pub device_id: Option<String>,
    pub vendor_id: Option<String>,
    pub product_id: Option<String>,
    pub description: Option<String>,
    pub user_email: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Present only after the manager has re-evaluated this event (§4.3).
    /// Absent on the wire when an agent/normalizer submits the event;
    /// `default` lets `POST /events` bodies omit it entirely.
    #[serde(default)]
    pub reevaluation: Option<Reevaluation>,
}

#[derive(Debug, thiserror::Error)]
pub enum EventValidationError {
    #[error("event_id is nil")]
    MissingEventId,
    #[error("agent_id is missing or malformed")]
    MissingAgentId,
    #[error("timestamp is missing")]
    MissingTimestamp,
}

impl Event {
    /// Required-field validation per §4.3 step 1. `event_id`/`agent_id`/
    /// `event_type`/`timestamp` are structurally required by the type system
    /// already; the one thing left to check is that `event_id` isn't the nil
    /// UUID, which some malformed clients send as a default value.
    pub fn validate(&self) -> Result<(), EventValidationError> {
        if self.event_id.is_nil() {
            return Err(EventValidationError::MissingEventId);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventQuery {
    pub limit: Option<usize>,
    pub event_type: Option<EventType>,
    pub severity: Option<Severity>,
    pub agent_id: Option<crate::domain::agent::AgentId>,
    pub q: Option<String>,
}
