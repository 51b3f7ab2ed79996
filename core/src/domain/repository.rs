// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository pattern — pluggable storage backend abstraction. One trait
//! per aggregate root; in-memory implementations back tests and `--dev`
//! mode, `sqlx`/Postgres implementations back production.

use async_trait::async_trait;

use crate::domain::agent::{Agent, AgentId};
use crate::domain::event::{Event, EventQuery};
use crate::domain::policy::{Policy, PolicyId, PolicyStats, PolicyType};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("entity not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row not found".to_string()),
            other => RepositoryError::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn upsert(&self, agent: Agent) -> Result<Agent, RepositoryError>;
    async fn find_by_id(&self, id: AgentId) -> Result<Option<Agent>, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<Agent>, RepositoryError>;
}

#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn create(&self, policy: Policy) -> Result<Policy, RepositoryError>;
    async fn update(&self, policy: Policy) -> Result<Policy, RepositoryError>;
    async fn find_by_id(&self, id: PolicyId) -> Result<Option<Policy>, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<Policy>, RepositoryError>;
    async fn list_enabled_by_type(&self, types: &[PolicyType]) -> Result<Vec<Policy>, RepositoryError>;
    async fn set_enabled(&self, id: PolicyId, enabled: bool) -> Result<Policy, RepositoryError>;
    async fn delete(&self, id: PolicyId) -> Result<(), RepositoryError>;
    async fn stats(&self) -> Result<PolicyStats, RepositoryError>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Returns `Ok(None)` when this is the first time `event.event_id` has
    /// been seen (caller should proceed to append). Returns `Ok(Some(_))`
    /// with the previously-stored record when it's a duplicate (§4.3 step 2,
    /// Testable Property 3) — the caller does not append again.
    async fn insert_if_absent(&self, event: Event) -> Result<InsertOutcome, RepositoryError>;
    async fn query(&self, query: EventQuery) -> Result<(Vec<Event>, usize), RepositoryError>;
    async fn len(&self) -> Result<usize, RepositoryError>;
}

#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Inserted(Event),
    AlreadyPresent(Event),
}
