// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the CyberSentinel CLI

pub mod agent;
pub mod events;
pub mod policy;
pub mod server;

pub use self::agent::AgentCommand;
pub use self::events::EventsCommand;
pub use self::policy::PolicyCommand;
pub use self::server::ServerCommand;
