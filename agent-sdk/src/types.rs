// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Wire request shapes for the manager's `/api/v1` surface (§6). Response
//! shapes are the domain types themselves (`Agent`, `PolicyBundle`,
//! `SyncResponse`, `Event`) re-exported from `cybersentinel_core`.

use cybersentinel_core::domain::agent::AgentCapabilities;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub agent_id: String,
    pub name: String,
    pub hostname: String,
    pub os: String,
    pub os_version: String,
    pub ip_address: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<AgentCapabilities>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatRequest {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_version: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PolicySyncRequest {
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed_version: Option<String>,
}

/// Minimal ack the manager returns from `POST /events`; the SDK doesn't need
/// the stored event back, only confirmation it was accepted (§4.3, §4.10).
#[derive(Debug, Clone, Deserialize)]
pub struct EventAck {
    pub event_id: uuid::Uuid,
}
