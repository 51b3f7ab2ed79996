// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Policy Store application service (§4.2). CRUD, enable/disable, summary
//! stats. Every write updates `updated_at` (§4.2 invariant).

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use crate::domain::error::ManagerError;
use crate::domain::policy::{Policy, PolicyConfig, PolicyId, PolicyStats, Severity};
use crate::domain::repository::PolicyRepository;

#[async_trait]
pub trait PolicyService: Send + Sync {
    async fn create(&self, name: String, description: String, severity: Severity, priority: i32, config: PolicyConfig)
        -> Result<Policy, ManagerError>;
    async fn update(&self, id: PolicyId, name: String, description: String, severity: Severity, priority: i32, config: PolicyConfig)
        -> Result<Policy, ManagerError>;
    async fn enable(&self, id: PolicyId) -> Result<Policy, ManagerError>;
    async fn disable(&self, id: PolicyId) -> Result<Policy, ManagerError>;
    async fn delete(&self, id: PolicyId) -> Result<(), ManagerError>;
    async fn get(&self, id: PolicyId) -> Result<Policy, ManagerError>;
    async fn list(&self) -> Result<Vec<Policy>, ManagerError>;
    async fn stats(&self) -> Result<PolicyStats, ManagerError>;
}

pub struct DefaultPolicyService {
    repo: Arc<dyn PolicyRepository>,
}

impl DefaultPolicyService {
    pub fn new(repo: Arc<dyn PolicyRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl PolicyService for DefaultPolicyService {
    async fn create(
        &self,
        name: String,
        description: String,
        severity: Severity,
        priority: i32,
        config: PolicyConfig,
    ) -> Result<Policy, ManagerError> {
        config.validate().map_err(|e| ManagerError::InvalidPolicyConfig(e.to_string()))?;
        let now = Utc::now();
        let policy = Policy {
            id: PolicyId::new(),
            name,
            description,
            severity,
            priority,
            enabled: true,
            config,
            created_at: now,
            updated_at: now,
        };
        Ok(self.repo.create(policy).await?)
    }

    async fn update(
        &self,
        id: PolicyId,
        name: String,
        description: String,
        severity: Severity,
        priority: i32,
        config: PolicyConfig,
    ) -> Result<Policy, ManagerError> {
        config.validate().map_err(|e| ManagerError::InvalidPolicyConfig(e.to_string()))?;
        let mut policy = self.repo.find_by_id(id).await?.ok_or_else(|| {
            ManagerError::InvalidPolicyConfig(format!("policy {id} not found"))
        })?;
        // `policy_id` is preserved across edits (§4.2).
        policy.name = name;
        policy.description = description;
        policy.severity = severity;
        policy.priority = priority;
        policy.config = config;
        policy.updated_at = Utc::now();
        Ok(self.repo.update(policy).await?)
    }

    async fn enable(&self, id: PolicyId) -> Result<Policy, ManagerError> {
        Ok(self.repo.set_enabled(id, true).await?)
    }

    async fn disable(&self, id: PolicyId) -> Result<Policy, ManagerError> {
        Ok(self.repo.set_enabled(id, false).await?)
    }

    async fn delete(&self, id: PolicyId) -> Result<(), ManagerError> {
        Ok(self.repo.delete(id).await?)
    }

    async fn get(&self, id: PolicyId) -> Result<Policy, ManagerError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| ManagerError::InvalidPolicyConfig(format!("policy {id} not found")))
    }

    async fn list(&self) -> Result<Vec<Policy>, ManagerError> {
        Ok(self.repo.list_all().await?)
    }

    async fn stats(&self) -> Result<PolicyStats, ManagerError> {
        Ok(self.repo.stats().await?)
    }
}
