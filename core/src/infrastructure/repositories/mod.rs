// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod in_memory;
pub mod postgres_agent;
pub mod postgres_event;
pub mod postgres_policy;

pub use in_memory::{InMemoryAgentRepository, InMemoryEventRepository, InMemoryPolicyRepository};
pub use postgres_agent::PostgresAgentRepository;
pub use postgres_event::PostgresEventRepository;
pub use postgres_policy::PostgresPolicyRepository;
