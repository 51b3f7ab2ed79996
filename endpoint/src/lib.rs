// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # CyberSentinel Endpoint Agent Runtime
//!
//! The privileged, long-lived process that runs on each managed host (§2
//! "Endpoint tier"). Owns the lifecycle state machine, the policy snapshot,
//! the four monitors (filesystem, clipboard, USB device, USB file-transfer),
//! the Enforcer, and the Uploader.
//!
//! ## Concurrency model (§5)
//!
//! One Tokio task per independent worker: enrollment/heartbeat loop, policy
//! sync loop, clipboard poll loop, USB device poll loop, USB transfer scan
//! loop, and one filesystem watcher per monitored root. Background restore
//! tasks are short-lived spawned tasks, one per scheduled restoration.
//!
//! **Lock ordering (global, §5):** policy snapshot lock → content cache lock
//! → quarantine lock → restored-set lock. Never acquire a lock higher in this
//! list while holding one lower in it. The dedup map's lock is independent of
//! this chain (never held concurrently with any of the above).
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | policy snapshot, quarantine entry, content cache, USB block state, clock |
//! | [`application`] | Application | config, dedup map, monitors, enforcer, uploader, the `Endpoint` runtime |

pub mod application;
pub mod domain;

pub use application::endpoint::Endpoint;
pub use application::config::EndpointConfig;
