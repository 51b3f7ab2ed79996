// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! PostgreSQL-backed `PolicyRepository`. `config` is stored as `jsonb` since
//! its shape varies per `PolicyType` (§3) — filtering by type happens in
//! Rust after the row is deserialized rather than via a JSON path query, to
//! keep the query surface simple.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use std::collections::BTreeMap;

use crate::domain::policy::{Policy, PolicyConfig, PolicyId, PolicyStats, PolicyType, Severity};
use crate::domain::repository::{PolicyRepository, RepositoryError};

pub struct PostgresPolicyRepository {
    pool: PgPool,
}

impl PostgresPolicyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_policy(row: sqlx::postgres::PgRow) -> Result<Policy, RepositoryError> {
        let config_json: serde_json::Value = row.get("config");
        let config: PolicyConfig = serde_json::from_value(config_json)?;
        let severity_str: String = row.get("severity");
        let severity = match severity_str.as_str() {
            "low" => Severity::Low,
            "medium" => Severity::Medium,
            "high" => Severity::High,
            _ => Severity::Critical,
        };
        Ok(Policy {
            id: PolicyId(row.get("id")),
            name: row.get("name"),
            description: row.get("description"),
            severity,
            priority: row.get("priority"),
            enabled: row.get("enabled"),
            config,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn severity_str(severity: Severity) -> &'static str {
        match severity {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

#[async_trait]
impl PolicyRepository for PostgresPolicyRepository {
    async fn create(&self, policy: Policy) -> Result<Policy, RepositoryError> {
        let config_json = serde_json::to_value(&policy.config)?;
        sqlx::query(
            r#"
            INSERT INTO policies (id, name, description, severity, priority, enabled, config, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(policy.id.0)
        .bind(&policy.name)
        .bind(&policy.description)
        .bind(Self::severity_str(policy.severity))
        .bind(policy.priority)
        .bind(policy.enabled)
        .bind(config_json)
        .bind(policy.created_at)
        .bind(policy.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(policy)
    }

    async fn update(&self, policy: Policy) -> Result<Policy, RepositoryError> {
        let config_json = serde_json::to_value(&policy.config)?;
        let result = sqlx::query(
            r#"
            UPDATE policies SET
                name = $2, description = $3, severity = $4, priority = $5,
                enabled = $6, config = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(policy.id.0)
        .bind(&policy.name)
        .bind(&policy.description)
        .bind(Self::severity_str(policy.severity))
        .bind(policy.priority)
        .bind(policy.enabled)
        .bind(config_json)
        .bind(policy.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(policy.id.to_string()));
        }
        Ok(policy)
    }

    async fn find_by_id(&self, id: PolicyId) -> Result<Option<Policy>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM policies WHERE id = $1").bind(id.0).fetch_optional(&self.pool).await?;
        row.map(Self::row_to_policy).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Policy>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM policies ORDER BY priority ASC, created_at ASC").fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_policy).collect()
    }

    async fn list_enabled_by_type(&self, types: &[PolicyType]) -> Result<Vec<Policy>, RepositoryError> {
        // Filtered in Rust: `config`'s `type` tag lives inside the jsonb blob
        // and the enabled set is small enough that a full scan is cheap.
        let all = self.list_all().await?;
        Ok(all.into_iter().filter(|p| p.enabled && types.contains(&p.policy_type())).collect())
    }

    async fn set_enabled(&self, id: PolicyId, enabled: bool) -> Result<Policy, RepositoryError> {
        let row = sqlx::query("UPDATE policies SET enabled = $2, updated_at = now() WHERE id = $1 RETURNING *")
            .bind(id.0)
            .bind(enabled)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        Self::row_to_policy(row)
    }

    async fn delete(&self, id: PolicyId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM policies WHERE id = $1").bind(id.0).execute(&self.pool).await?;
        Ok(())
    }

    async fn stats(&self) -> Result<PolicyStats, RepositoryError> {
        let all = self.list_all().await?;
        let mut stats = PolicyStats::default();
        let mut by_type: BTreeMap<String, u64> = BTreeMap::new();
        for p in &all {
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
