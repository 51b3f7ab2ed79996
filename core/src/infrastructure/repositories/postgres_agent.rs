// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! PostgreSQL-backed `AgentRepository`. Translates between the `Agent`
//! domain aggregate and the `agents` table (see `migrations/`).

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::agent::{Agent, AgentCapabilities, AgentId};
use crate::domain::repository::{AgentRepository, RepositoryError};

pub struct PostgresAgentRepository {
    pool: PgPool,
}

impl PostgresAgentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_agent(row: sqlx::postgres::PgRow) -> Result<Agent, RepositoryError> {
        let capabilities_json: serde_json::Value = row.get("capabilities");
        let capabilities: AgentCapabilities = serde_json::from_value(capabilities_json)?;
        Ok(Agent {
            id: AgentId(row.get("id")),
            name: row.get("name"),
            hostname: row.get("hostname"),
            os_family: row.get("os_family"),
            os_version: row.get("os_version"),
            agent_version: row.get("agent_version"),
            last_ip: row.get("last_ip"),
            capabilities,
            first_seen: row.get("first_seen"),
            last_seen: row.get("last_seen"),
            installed_policy_version: row.get("installed_policy_version"),
            active: row.get("active"),
        })
    }
}

#[async_trait]
impl AgentRepository for PostgresAgentRepository {
    async fn upsert(&self, agent: Agent) -> Result<Agent, RepositoryError> {
        let capabilities_json = serde_json::to_value(&agent.capabilities)?;

        sqlx::query(
            r#"
            INSERT INTO agents (
                id, name, hostname, os_family, os_version, agent_version, last_ip,
                capabilities, first_seen, last_seen, installed_policy_version, active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                hostname = EXCLUDED.hostname,
                os_family = EXCLUDED.os_family,
                os_version = EXCLUDED.os_version,
                agent_version = EXCLUDED.agent_version,
                last_ip = EXCLUDED.last_ip,
                capabilities = EXCLUDED.capabilities,
                last_seen = EXCLUDED.last_seen,
                installed_policy_version = EXCLUDED.installed_policy_version,
                active = EXCLUDED.active
            "#,
        )
        .bind(agent.id.0)
        .bind(&agent.name)
        .bind(&agent.hostname)
        .bind(&agent.os_family)
        .bind(&agent.os_version)
        .bind(&agent.agent_version)
        .bind(&agent.last_ip)
        .bind(capabilities_json)
        .bind(agent.first_seen)
        .bind(agent.last_seen)
        .bind(&agent.installed_policy_version)
        .bind(agent.active)
        .execute(&self.pool)
        .await?;

        Ok(agent)
    }

    async fn find_by_id(&self, id: AgentId) -> Result<Option<Agent>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM agents WHERE id = $1").bind(id.0).fetch_optional(&self.pool).await?;
        row.map(Self::row_to_agent).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Agent>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM agents ORDER BY last_seen DESC").fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_agent).collect()
    }
}
