// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-memory repository implementations. Used by `--dev` mode and by every
//! unit test in `application/`; swapped for the `postgres_*` implementations
//! in production via `create_*_repository` (see `infrastructure::mod`).

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;

use crate::domain::agent::{Agent, AgentId};
use crate::domain::event::{Event, EventQuery};
use crate::domain::policy::{Policy, PolicyId, PolicyStats, PolicyType};
use crate::domain::repository::{AgentRepository, EventRepository, InsertOutcome, PolicyRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryAgentRepository {
    agents: DashMap<AgentId, Agent>,
}

impl InMemoryAgentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentRepository for InMemoryAgentRepository {
    async fn upsert(&self, agent: Agent) -> Result<Agent, RepositoryError> {
        self.agents.insert(agent.id, agent.clone());
        Ok(agent)
    }

    async fn find_by_id(&self, id: AgentId) -> Result<Option<Agent>, RepositoryError> {
        Ok(self.agents.get(&id).map(|a| a.clone()))
    }

    async fn list_all(&self) -> Result<Vec<Agent>, RepositoryError> {
        Ok(self.agents.iter().map(|e| e.value().clone()).collect())
    }
}

#[derive(Default)]
pub struct InMemoryPolicyRepository {
    policies: DashMap<PolicyId, Policy>,
}

impl InMemoryPolicyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyRepository for InMemoryPolicyRepository {
    async fn create(&self, policy: Policy) -> Result<Policy, RepositoryError> {
        self.policies.insert(policy.id, policy.clone());
        Ok(policy)
    }

    async fn update(&self, policy: Policy) -> Result<Policy, RepositoryError> {
        if !self.policies.contains_key(&policy.id) {
            return Err(RepositoryError::NotFound(policy.id.to_string()));
        }
        self.policies.insert(policy.id, policy.clone());
        Ok(policy)
    }

    async fn find_by_id(&self, id: PolicyId) -> Result<Option<Policy>, RepositoryError> {
        Ok(self.policies.get(&id).map(|p| p.clone()))
    }

    async fn list_all(&self) -> Result<Vec<Policy>, RepositoryError> {
        Ok(self.policies.iter().map(|e| e.value().clone()).collect())
    }

    async fn list_enabled_by_type(&self, types: &[PolicyType]) -> Result<Vec<Policy>, RepositoryError> {
        Ok(self
            .policies
            .iter()
            .map(|e| e.value().clone())
            .filter(|p| p.enabled && types.contains(&p.policy_type()))
            .collect())
    }

    async fn set_enabled(&self, id: PolicyId, enabled: bool) -> Result<Policy, RepositoryError> {
        let mut entry = self.policies.get_mut(&id).ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        entry.enabled = enabled;
        entry.updated_at = chrono::Utc::now();
        Ok(entry.clone())
    }

    async fn delete(&self, id: PolicyId) -> Result<(), RepositoryError> {
        self.policies.remove(&id);
        Ok(())
    }

    async fn stats(&self) -> Result<PolicyStats, RepositoryError> {
        let mut stats = PolicyStats::default();
        let mut by_type: BTreeMap<String, u64> = BTreeMap::new();
        for entry in self.policies.iter() {
            let p = entry.value();
            stats.total += 1;
            if p.enabled {
                stats.enabled += 1;
            } else {
                stats.disabled += 1;
            }
            *by_type.entry(p.policy_type().wire_key().to_string()).or_default() += 1;
        }
        stats.by_type = by_type;
        Ok(stats)
    }
}

#[derive(Default)]
struct EventStore {
    by_id: std::collections::HashMap<uuid::Uuid, usize>,
    ordered: Vec<Event>,
}

pub struct InMemoryEventRepository {
    store: Mutex<EventStore>,
}

impl Default for InMemoryEventRepository {
    fn default() -> Self {
        Self { store: Mutex::new(EventStore::default()) }
    }
}

impl InMemoryEventRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn insert_if_absent(&self, event: Event) -> Result<InsertOutcome, RepositoryError> {
        let mut store = self.store.lock();
        if let Some(&idx) = store.by_id.get(&event.event_id) {
            return Ok(InsertOutcome::AlreadyPresent(store.ordered[idx].clone()));
        }
        let idx = store.ordered.len();
        store.by_id.insert(event.event_id, idx);
        store.ordered.push(event.clone());
        Ok(InsertOutcome::Inserted(event))
    }

    async fn query(&self, query: EventQuery) -> Result<(Vec<Event>, usize), RepositoryError> {
        let store = self.store.lock();
        let mut matched: Vec<Event> = store
            .ordered
            .iter()
            .rev()
            .filter(|e| query.event_type.is_none_or(|t| t == e.event_type))
            .filter(|e| query.severity.is_none_or(|s| s == e.severity))
            .filter(|e| query.agent_id.is_none_or(|a| a == e.agent_id))
            .filter(|e| {
                query.q.as_deref().is_none_or(|needle| {
                    let needle = needle.to_ascii_lowercase();
                    e.file_path.as_deref().is_some_and(|p| p.to_ascii_lowercase().contains(&needle))
                        || e.file_name.as_deref().is_some_and(|n| n.to_ascii_lowercase().contains(&needle))
                        || e.device_name.as_deref().is_some_and(|n| n.to_ascii_lowercase().contains(&needle))
                })
            })
            .cloned()
            .collect();
        let total = matched.len();
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok((matched, total))
    }

    async fn len(&self) -> Result<usize, RepositoryError> {
        Ok(self.store.lock().ordered.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::{DetectedContentSummary, EventAction, EventSubtype, EventType, SourceType};
    use crate::domain::policy::Severity;
    use chrono::Utc;
    use uuid::Uuid;

    fn event(id: Uuid) -> Event {
        Event {
            event_id: id,
            agent_id: AgentId::new(),
            source_type: SourceType::Agent,
            event_type: EventType::File,
            event_subtype: EventSubtype::FileModified,
            severity: Severity::Low,
            action: EventAction::Logged,
            file_path: None,
            file_name: None,
            file_size: None,
            file_hash: None,
            detected_content: DetectedContentSummary::default(),
            data_types: vec![],
            matched_policies: vec![],
            total_matches: 0,
            device_name: None,
            device_id: None,
            vendor_id: None,
            product_id: None,
            description: None,
            user_email: None,
            timestamp: Utc::now(),
            reevaluation: None,
        }
    }

    #[tokio::test]
    async fn insert_if_absent_dedupes_by_event_id() {
        let repo = InMemoryEventRepository::new();
        let id = Uuid::new_v4();
        let first = repo.insert_if_absent(event(id)).await.unwrap();
        assert!(matches!(first, InsertOutcome::Inserted(_)));
        let second = repo.insert_if_absent(event(id)).await.unwrap();
        assert!(matches!(second, InsertOutcome::AlreadyPresent(_)));
        assert_eq!(repo.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn query_returns_newest_first_with_total_count() {
        let repo = InMemoryEventRepository::new();
        for _ in 0..5 {
            repo.insert_if_absent(event(Uuid::new_v4())).await.unwrap();
        }
        let (page, total) = repo.query(EventQuery { limit: Some(2), ..Default::default() }).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
    }
}
