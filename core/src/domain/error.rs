// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! The language-neutral error kinds from §7, realized as one `thiserror`
//! enum shared by the manager's application services. `DuplicateEvent` is
//! deliberately *not* surfaced as an error at the ingest boundary (§4.3 step
//! 2, §7): `IngestService::ingest` returns `Ok` with the previously-stored
//! record, this variant exists only for callers that need to distinguish
//! "already had this" from "this is new" internally.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("invalid agent id: {0}")]
    InvalidIdentity(String),

    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("duplicate event")]
    DuplicateEvent,

    #[error("invalid policy config: {0}")]
    InvalidPolicyConfig(String),

    #[error("manager busy, retry later")]
    Busy,

    #[error("repository error: {0}")]
    Repository(#[from] crate::domain::repository::RepositoryError),
}
