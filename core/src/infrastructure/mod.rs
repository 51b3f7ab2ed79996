// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure layer: pluggable storage backends and the event bus.
//! `StorageBackend` lets `cybersentinel server` pick in-memory storage for
//! `--dev`/tests or PostgreSQL for production without the application layer
//! knowing the difference (§4.11).

pub mod db;
pub mod event_bus;
pub mod repositories;

use std::sync::Arc;

use crate::domain::repository::{AgentRepository, EventRepository, PolicyRepository};
use db::Database;
use repositories::{
    InMemoryAgentRepository, InMemoryEventRepository, InMemoryPolicyRepository, PostgresAgentRepository,
    PostgresEventRepository, PostgresPolicyRepository,
};

#[derive(Clone)]
pub enum StorageBackend {
    InMemory,
    Postgres(Database),
}

pub fn create_agent_repository(backend: &StorageBackend) -> Arc<dyn AgentRepository> {
    match backend {
        StorageBackend::InMemory => Arc::new(InMemoryAgentRepository::new()),
        StorageBackend::Postgres(db) => Arc::new(PostgresAgentRepository::new(db.pool().clone())),
    }
}

pub fn create_policy_repository(backend: &StorageBackend) -> Arc<dyn PolicyRepository> {
    match backend {
        StorageBackend::InMemory => Arc::new(InMemoryPolicyRepository::new()),
        StorageBackend::Postgres(db) => Arc::new(PostgresPolicyRepository::new(db.pool().clone())),
    }
}

pub fn create_event_repository(backend: &StorageBackend) -> Arc<dyn EventRepository> {
    match backend {
        StorageBackend::InMemory => Arc::new(InMemoryEventRepository::new()),
        StorageBackend::Postgres(db) => Arc::new(PostgresEventRepository::new(db.pool().clone())),
    }
}
