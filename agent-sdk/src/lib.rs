// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Typed HTTP client for the CyberSentinel endpoint agent to talk to the
//! manager: register, heartbeat, unregister, policy sync, event submission
//! with retry/backoff (§0, §6).

pub mod client;
pub mod types;

pub use client::{ManagerClient, SubmitOutcome};
pub use types::*;
