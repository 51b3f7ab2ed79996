// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `/agents` — enrollment, heartbeat, unregister, policy sync (§6, §4.1, §4.2).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::agent::{Agent, AgentCapabilities, Platform};
use crate::domain::bundle::SyncResponse;
use crate::presentation::error::ApiError;
use crate::presentation::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub agent_id: String,
    pub name: String,
    pub hostname: String,
    pub os: String,
    pub os_version: String,
    pub ip_address: String,
    pub version: String,
    #[serde(default)]
    pub capabilities: Option<AgentCapabilities>,
}

#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub agent_id: String,
    pub name: String,
    pub hostname: String,
    pub os: String,
    pub os_version: String,
    pub version: String,
    pub ip_address: String,
    pub capabilities: AgentCapabilities,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub installed_policy_version: Option<String>,
    pub active: bool,
}

impl From<Agent> for AgentResponse {
    fn from(agent: Agent) -> Self {
        Self {
            agent_id: agent.id.to_string(),
            name: agent.name,
            hostname: agent.hostname,
            os: agent.os_family,
            os_version: agent.os_version,
            version: agent.agent_version,
            ip_address: agent.last_ip,
            capabilities: agent.capabilities,
            first_seen: agent.first_seen,
            last_seen: agent.last_seen,
            installed_policy_version: agent.installed_policy_version,
            active: agent.active,
        }
    }
}

/// `POST /agents` — upsert-enroll, idempotent on `agent_id` (§4.1, §6).
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AgentResponse>, ApiError> {
    let agent = state
        .registry
        .register(
            &req.agent_id,
            req.name,
            req.hostname,
            req.os,
            req.os_version,
            req.version,
            req.ip_address,
            req.capabilities.unwrap_or_default(),
        )
        .await?;
    state
        .events
        .publish(crate::infrastructure::event_bus::DomainEvent::AgentRegistered { agent_id: agent.id });
    Ok(Json(agent.into()))
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub timestamp: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub policy_version: Option<String>,
}

/// `PUT /agents/{agent_id}/heartbeat` — refresh `last_seen` (§4.1, §6).
pub async fn heartbeat(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Json(req): Json<HeartbeatRequest>,
) -> Result<StatusCode, ApiError> {
    let agent = state
        .registry
        .heartbeat(&agent_id, req.timestamp, req.ip_address, req.policy_version)
        .await?;
    state
        .events
        .publish(crate::infrastructure::event_bus::DomainEvent::AgentHeartbeat { agent_id: agent.id });
    Ok(StatusCode::OK)
}

/// `DELETE /agents/{agent_id}/unregister` — soft-unregister (§4.1, §6).
pub async fn unregister(State(state): State<AppState>, Path(agent_id): Path<String>) -> Result<StatusCode, ApiError> {
    state.registry.unregister(&agent_id).await?;
    if let Ok(id) = crate::domain::agent::AgentId::from_string(&agent_id) {
        state
            .events
            .publish(crate::infrastructure::event_bus::DomainEvent::AgentUnregistered { agent_id: id });
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct PolicySyncRequest {
    pub platform: String,
    #[serde(default)]
    pub installed_version: Option<String>,
}

/// `POST /agents/{agent_id}/policies/sync` — deterministic bundle for
/// `platform` (§4.2, §6, Testable Properties 1-2). The `agent_id` path
/// segment identifies the caller for logging only — bundle content is not
/// scoped per-agent beyond platform (see DESIGN.md, Open Question).
pub async fn sync(
    State(state): State<AppState>,
    Path(_agent_id): Path<String>,
    Json(req): Json<PolicySyncRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let platform = Platform::from_str(&req.platform)
        .map_err(|_| ApiError(crate::domain::error::ManagerError::InvalidIdentity(format!("unknown platform {}", req.platform))))?;
    let response = state.bundles.sync(platform, req.installed_version.as_deref()).await?;
    let body = match response {
        SyncResponse::UpToDate => serde_json::json!({ "status": "up_to_date" }),
        SyncResponse::Bundle(bundle) => serde_json::to_value(bundle).unwrap(),
    };
    Ok(Json(body))
}

/// `GET /agents` — not in the literal §6 table but needed by the CLI's
/// admin client and by the dashboard's "active agents" overview (§4.1):
/// `active_agents` is exactly `list_active()`'s count, nothing else.
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<AgentResponse>>, ApiError> {
    let agents = state.registry.list_active().await?;
    Ok(Json(agents.into_iter().map(AgentResponse::from).collect()))
}
