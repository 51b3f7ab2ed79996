// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `/policies` — CRUD, enable/disable, summary stats (§4.2, §6).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::policy::{Policy, PolicyConfig, PolicyId, PolicyStats, Severity};
use crate::presentation::error::ApiError;
use crate::presentation::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpsertPolicyRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub severity: Severity,
    #[serde(default)]
    pub priority: i32,
    pub config: PolicyConfig,
}

pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<UpsertPolicyRequest>,
) -> Result<(StatusCode, Json<Policy>), ApiError> {
    let policy = state
        .policies
        .create(req.name, req.description, req.severity, req.priority, req.config)
        .await?;
    state
        .events
        .publish(crate::infrastructure::event_bus::DomainEvent::PolicyChanged { policy_id: policy.id });
    Ok((StatusCode::CREATED, Json(policy)))
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Policy>>, ApiError> {
    Ok(Json(state.policies.list().await?))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Policy>, ApiError> {
    Ok(Json(state.policies.get(PolicyId(id)).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpsertPolicyRequest>,
) -> Result<Json<Policy>, ApiError> {
    let policy = state
        .policies
        .update(PolicyId(id), req.name, req.description, req.severity, req.priority, req.config)
        .await?;
    state
        .events
        .publish(crate::infrastructure::event_bus::DomainEvent::PolicyChanged { policy_id: policy.id });
    Ok(Json(policy))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    state.policies.delete(PolicyId(id)).await?;
    state
        .events
        .publish(crate::infrastructure::event_bus::DomainEvent::PolicyChanged { policy_id: PolicyId(id) });
    Ok(StatusCode::NO_CONTENT)
}

pub async fn enable(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Policy>, ApiError> {
    let policy = state.policies.enable(PolicyId(id)).await?;
    state
        .events
        .publish(crate::infrastructure::event_bus::DomainEvent::PolicyChanged { policy_id: policy.id });
    Ok(Json(policy))
}

pub async fn disable(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Policy>, ApiError> {
    let policy = state.policies.disable(PolicyId(id)).await?;
    state
        .events
        .publish(crate::infrastructure::event_bus::DomainEvent::PolicyChanged { policy_id: policy.id });
    Ok(Json(policy))
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<PolicyStats>, ApiError> {
    Ok(Json(state.policies.stats().await?))
}
