// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `/events` — ingest (§4.3) and indexed query (§6, §4.11).

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::application::ingest_service::IngestRequest;
use crate::domain::event::{Event, EventQuery, EventType};
use crate::domain::policy::Severity;
use crate::presentation::error::ApiError;
use crate::presentation::state::AppState;

/// The wire body for `POST /events` is the `Event` shape from §3 plus an
/// optional `content` field carrying the raw observed bytes/text — used
/// only for re-evaluation (§4.3 step 3) and never persisted verbatim.
#[derive(Debug, Deserialize)]
pub struct IngestEventRequest {
    #[serde(flatten)]
    pub event: Event,
    #[serde(default)]
    pub content: Option<String>,
}

/// `POST /events` — idempotent on `event_id` (§4.3, §6, Testable Property 3).
pub async fn ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestEventRequest>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    let stored = state
        .ingestor
        .ingest(IngestRequest { event: req.event, raw_content: req.content })
        .await?;
    state
        .events
        .publish(crate::infrastructure::event_bus::DomainEvent::EventIngested { event: Box::new(stored.clone()) });
    Ok((StatusCode::CREATED, Json(stored)))
}

#[derive(Debug, Deserialize, Default)]
pub struct EventsQueryParams {
    pub limit: Option<usize>,
    pub event_type: Option<EventType>,
    pub severity: Option<Severity>,
    pub agent_id: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct EventsResponse {
    pub events: Vec<Event>,
    pub total: usize,
}

/// `GET /events?limit=&event_type=&severity=&agent_id=&q=` (§6).
pub async fn query(
    State(state): State<AppState>,
    Query(params): Query<EventsQueryParams>,
) -> Result<Json<EventsResponse>, ApiError> {
    let agent_id = match params.agent_id {
        Some(s) => Some(
            crate::domain::agent::AgentId::from_string(&s)
                .map_err(|e| ApiError(crate::domain::error::ManagerError::InvalidIdentity(e.to_string())))?,
        ),
        None => None,
    };
    let (events, total) = state
        .ingestor
        .query(EventQuery { limit: params.limit, event_type: params.event_type, severity: params.severity, agent_id, q: params.q })
        .await?;
    Ok(Json(EventsResponse { events, total }))
}
