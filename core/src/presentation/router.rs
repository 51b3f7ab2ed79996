// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Wires every handler onto the `/api/v1` path prefix (§6), plus
//! `tower-http`'s request tracing layer on every route.

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use super::{agents, events, health, policies, state::AppState};

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/agents", post(agents::register).get(agents::list))
        .route("/agents/{agent_id}/heartbeat", put(agents::heartbeat))
        .route("/agents/{agent_id}/unregister", delete(agents::unregister))
        .route("/agents/{agent_id}/policies/sync", post(agents::sync))
        .route("/events", post(events::ingest).get(events::query))
        .route("/policies", get(policies::list).post(policies::create))
        .route("/policies/stats/summary", get(policies::stats))
        .route("/policies/{id}", put(policies::update).delete(policies::delete))
        .route("/policies/{id}/enable", post(policies::enable))
        .route("/policies/{id}/disable", post(policies::disable));

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
