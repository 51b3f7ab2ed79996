// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `cybersentinel-core` — shared domain, Classifier, and manager services
//!
//! This crate is the one dependency every other crate in the workspace
//! shares: the agent endpoint links it for the pure Classifier and the
//! wire-format domain types (so its advisory classification is byte-for-byte
//! the same code the manager re-runs authoritatively, §4.3); the manager
//! binary links it for everything — Registry, Policy Store, Bundle
//! Assembler, Event Ingestor, and the axum HTTP surface.
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | Aggregates, the pure Classifier, detectors, repository traits |
//! | [`application`] | Application | Registry/Policy/Bundle/Ingest services |
//! | [`infrastructure`] | Infrastructure | In-memory + Postgres repositories, event bus, db pool |
//! | [`presentation`] | Presentation | axum HTTP API (§6) |

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
