// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! PostgreSQL-backed `EventRepository`. `event_id` carries a unique
//! constraint (see `migrations/`); `insert_if_absent` relies on
//! `ON CONFLICT DO NOTHING` plus a follow-up read rather than a
//! check-then-insert, so it stays correct under concurrent submissions of
//! the same `event_id` (Testable Property 3).

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::{QueryBuilder, Row};

use crate::domain::agent::AgentId;
use crate::domain::event::{
    DetectedContentSummary, Event, EventAction, EventQuery, EventSubtype, EventType, Reevaluation, SourceType,
};
use crate::domain::policy::{PolicyId, Severity};
use crate::domain::repository::{EventRepository, InsertOutcome, RepositoryError};

pub struct PostgresEventRepository {
    pool: PgPool,
}

impl PostgresEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_event(row: sqlx::postgres::PgRow) -> Result<Event, RepositoryError> {
        let detected_content_json: serde_json::Value = row.get("detected_content");
        let detected_content: DetectedContentSummary = serde_json::from_value(detected_content_json)?;
        let matched_policies_json: serde_json::Value = row.get("matched_policies");
        let matched_policies: Vec<PolicyId> = serde_json::from_value(matched_policies_json)?;
        let reevaluation_json: Option<serde_json::Value> = row.get("reevaluation");
        let reevaluation: Option<Reevaluation> = reevaluation_json.map(serde_json::from_value).transpose()?;

        Ok(Event {
            event_id: row.get("event_id"),
            agent_id: AgentId(row.get("agent_id")),
            source_type: parse_source_type(row.get("source_type")),
            event_type: parse_event_type(row.get("event_type")),
            event_subtype: parse_event_subtype(row.get("event_subtype")),
            severity: parse_severity(row.get("severity")),
            action: parse_action(row.get("action")),
            file_path: row.get("file_path"),
            file_name: row.get("file_name"),
            file_size: row.get::<Option<i64>, _>("file_size").map(|v| v as u64),
            file_hash: row.get("file_hash"),
            detected_content,
            data_types: row.get("data_types"),
            matched_policies,
            total_matches: row.get::<i32, _>("total_matches") as u32,
            device_name: row.get("device_name"),
            device_id: row.get("device_id"),
            vendor_id: row.get("vendor_id"),
            product_id: row.get("product_id"),
            description: row.get("description"),
            user_email: row.get("user_email"),
            timestamp: row.get("timestamp"),
            reevaluation,
        })
    }
}

fn parse_source_type(s: String) -> SourceType {
    match s.as_str() {
        "cloud" => SourceType::Cloud,
        _ => SourceType::Agent,
    }
}

fn parse_event_type(s: String) -> EventType {
    match s.as_str() {
        "clipboard" => EventType::Clipboard,
        "usb" => EventType::Usb,
        _ => EventType::File,
    }
}

fn parse_event_subtype(s: String) -> EventSubtype {
    match s.as_str() {
        "file_created" => EventSubtype::FileCreated,
        "file_deleted" => EventSubtype::FileDeleted,
        "file_renamed" => EventSubtype::FileRenamed,
        "clipboard_copy" => EventSubtype::ClipboardCopy,
        "usb_connect" => EventSubtype::UsbConnect,
        "usb_disconnect" => EventSubtype::UsbDisconnect,
        "usb_file_transfer" => EventSubtype::UsbFileTransfer,
        "usb_blocked" => EventSubtype::UsbBlocked,
        "transfer_blocked" => EventSubtype::TransferBlocked,
        _ => EventSubtype::FileModified,
    }
}

fn parse_severity(s: String) -> Severity {
    match s.as_str() {
        "low" => Severity::Low,
        "medium" => Severity::Medium,
        "high" => Severity::High,
        _ => Severity::Critical,
    }
}

fn parse_action(s: String) -> EventAction {
    match s.as_str() {
        "log" => EventAction::Log,
        "alert" => EventAction::Alert,
        "quarantined" => EventAction::Quarantined,
        "quarantined_on_delete" => EventAction::QuarantinedOnDelete,
        "deleted" => EventAction::Deleted,
        "blocked" => EventAction::Blocked,
        "usb_blocked" => EventAction::UsbBlocked,
        "blocked_copy" => EventAction::BlockedCopy,
        "blocked_move" => EventAction::BlockedMove,
        "quarantined_copy" => EventAction::QuarantinedCopy,
        "quarantined_move" => EventAction::QuarantinedMove,
        "alerted" => EventAction::Alerted,
        "quarantine_failed" => EventAction::QuarantineFailed,
        "block_failed" => EventAction::BlockFailed,
        _ => EventAction::Logged,
    }
}

fn wire(event: &Event) -> serde_json::Result<(serde_json::Value, serde_json::Value, Option<serde_json::Value>)> {
    Ok((
        serde_json::to_value(&event.detected_content)?,
        serde_json::to_value(&event.matched_policies)?,
        event.reevaluation.as_ref().map(serde_json::to_value).transpose()?,
    ))
}

#[async_trait]
impl EventRepository for PostgresEventRepository {
    async fn insert_if_absent(&self, event: Event) -> Result<InsertOutcome, RepositoryError> {
        let (detected_content, matched_policies, reevaluation) = wire(&event)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO events (
                event_id, agent_id, source_type, event_type, event_subtype, severity, action,
                file_path, file_name, file_size, file_hash, detected_content, data_types,
                matched_policies, total_matches, device_name, device_id, vendor_id, product_id,
                description, user_email, timestamp, reevaluation
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event.event_id)
        .bind(event.agent_id.0)
        .bind(format!("{:?}", event.source_type).to_ascii_lowercase())
        .bind(format!("{:?}", event.event_type).to_ascii_lowercase())
        .bind(subtype_str(event.event_subtype))
        .bind(severity_str(event.severity))
        .bind(action_str(event.action))
        .bind(&event.file_path)
        .bind(&event.file_name)
        .bind(event.file_size.map(|v| v as i64))
        .bind(&event.file_hash)
        .bind(detected_content)
        .bind(&event.data_types)
        .bind(matched_policies)
        .bind(event.total_matches as i32)
        .bind(&event.device_name)
        .bind(&event.device_id)
        .bind(&event.vendor_id)
        .bind(&event.product_id)
        .bind(&event.description)
        .bind(&event.user_email)
        .bind(event.timestamp)
        .bind(reevaluation)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 1 {
            return Ok(InsertOutcome::Inserted(event));
        }

        let row = sqlx::query("SELECT * FROM events WHERE event_id = $1")
            .bind(event.event_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(InsertOutcome::AlreadyPresent(Self::row_to_event(row)?))
    }

    async fn query(&self, query: EventQuery) -> Result<(Vec<Event>, usize), RepositoryError> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new("SELECT * FROM events WHERE 1 = 1");
        if let Some(event_type) = query.event_type {
            builder.push(" AND event_type = ").push_bind(format!("{:?}", event_type).to_ascii_lowercase());
        }
        if let Some(severity) = query.severity {
            builder.push(" AND severity = ").push_bind(severity_str(severity));
        }
        if let Some(agent_id) = query.agent_id {
            builder.push(" AND agent_id = ").push_bind(agent_id.0);
        }
        if let Some(q) = &query.q {
            let needle = format!("%{q}%");
            builder.push(" AND (file_path ILIKE ").push_bind(needle.clone());
            builder.push(" OR file_name ILIKE ").push_bind(needle.clone());
            builder.push(" OR device_name ILIKE ").push_bind(needle);
            builder.push(")");
        }
        builder.push(" ORDER BY timestamp DESC");
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = builder.build().fetch_all(&self.pool).await?;
        let events = rows.into_iter().map(Self::row_to_event).collect::<Result<Vec<_>, _>>()?;
        let total = self.len().await?;
        Ok((events, total))
    }

    async fn len(&self) -> Result<usize, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM events").fetch_one(&self.pool).await?;
        Ok(row.get::<i64, _>("n") as usize)
    }
}

fn subtype_str(subtype: EventSubtype) -> &'static str {
    match subtype {
        EventSubtype::FileCreated => "file_created",
        EventSubtype::FileModified => "file_modified",
        EventSubtype::FileDeleted => "file_deleted",
        EventSubtype::FileRenamed => "file_renamed",
        EventSubtype::ClipboardCopy => "clipboard_copy",
        EventSubtype::UsbConnect => "usb_connect",
        EventSubtype::UsbDisconnect => "usb_disconnect",
        EventSubtype::UsbFileTransfer => "usb_file_transfer",
        EventSubtype::UsbBlocked => "usb_blocked",
        EventSubtype::TransferBlocked => "transfer_blocked",
    }
}

fn severity_str(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "low",
        Severity::Medium => "medium",
        Severity::High => "high",
        Severity::Critical => "critical",
    }
}

fn action_str(action: EventAction) -> &'static str {
    match action {
        EventAction::Log => "log",
        EventAction::Alert => "alert",
        EventAction::Quarantined => "quarantined",
        EventAction::QuarantinedOnDelete => "quarantined_on_delete",
        EventAction::Deleted => "deleted",
        EventAction::Blocked => "blocked",
        EventAction::UsbBlocked => "usb_blocked",
        EventAction::BlockedCopy => "blocked_copy",
        EventAction::BlockedMove => "blocked_move",
        EventAction::QuarantinedCopy => "quarantined_copy",
        EventAction::QuarantinedMove => "quarantined_move",
        EventAction::Alerted => "alerted",
        EventAction::Logged => "logged",
        EventAction::QuarantineFailed => "quarantine_failed",
        EventAction::BlockFailed => "block_failed",
    }
}
