// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `/health` (liveness) and `/ready` (readiness) — §6.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::presentation::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy", service: "cybersentinel-manager", version: env!("CARGO_PKG_VERSION") })
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub cache: &'static str,
    pub search: &'static str,
}

/// Readiness is OK iff the primary store (Registry/Policy/Event repositories,
/// whichever backend is configured) answers a trivial read. This crate
/// carries no cache or search-engine dependency — event queries (§4.11) use
/// a simple substring match, not an indexed search backend — so those two
/// legs are reported `not_configured` rather than probed.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let database_ok = state.registry.list_active().await.is_ok();
    let status = if database_ok { "ready" } else { "unavailable" };
    let code = if database_ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        code,
        Json(ReadyResponse {
            status,
            database: if database_ok { "ok" } else { "unavailable" },
            cache: "not_configured",
            search: "not_configured",
        }),
    )
}
