// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent aggregate (BC-1 Agent Registry). One record per enrolled endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, AgentIdError> {
        if s.trim().is_empty() {
            return Err(AgentIdError::Empty);
        }
        Uuid::parse_str(s).map(Self).map_err(|_| AgentIdError::Malformed)
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentIdError {
    #[error("agent id is empty")]
    Empty,
    #[error("agent id is malformed")]
    Malformed,
}

/// Which monitor families an endpoint build supports. The bundle assembler
/// does not currently filter by this (see DESIGN.md, Open Question), but it
/// is recorded so a future assembler can.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCapabilities {
    pub file: bool,
    pub clipboard: bool,
    pub usb_device: bool,
    pub usb_transfer: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Linux,
    Macos,
}

impl std::str::FromStr for Platform {
    type Err = AgentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "windows" => Ok(Platform::Windows),
            "linux" => Ok(Platform::Linux),
            "macos" | "darwin" => Ok(Platform::Macos),
            _ => Err(AgentIdError::Malformed),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Platform::Windows => "windows",
            Platform::Linux => "linux",
            Platform::Macos => "macos",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub hostname: String,
    pub os_family: String,
    pub os_version: String,
    /// Endpoint software version reported at enrollment (§6 `version`), not
    /// to be confused with the installed policy bundle version below.
    pub agent_version: String,
    pub last_ip: String,
    pub capabilities: AgentCapabilities,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub installed_policy_version: Option<String>,
    /// Soft-delete flag set by `unregister`. Historical events still
    /// reference this record after it is set.
    pub active: bool,
}

impl Agent {
    /// An agent is active (live, not soft-deleted) iff it hasn't been
    /// unregistered AND its last heartbeat is within `liveness_window`.
    pub fn is_live(&self, now: DateTime<Utc>, liveness_window: chrono::Duration) -> bool {
        self.active && now - self.last_seen <= liveness_window
    }
}

pub const DEFAULT_LIVENESS_WINDOW_SECS: i64 = 5 * 60;
