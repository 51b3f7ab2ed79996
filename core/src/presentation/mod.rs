// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Presentation layer: the axum HTTP API (§6 "External Interfaces"). Thin —
//! every handler deserializes a request DTO, calls exactly one application
//! service method, and maps the result to a response DTO or an
//! `IntoResponse` error. No business logic lives here.

pub mod agents;
pub mod error;
pub mod events;
pub mod health;
pub mod policies;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
