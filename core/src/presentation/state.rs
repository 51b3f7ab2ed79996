// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Shared axum handler state: one `Arc` per application service plus the
//! event bus, cloned cheaply into every request.

use std::sync::Arc;

use crate::application::{BundleService, IngestService, PolicyService, RegistryService};
use crate::infrastructure::event_bus::EventBus;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<dyn RegistryService>,
    pub policies: Arc<dyn PolicyService>,
    pub bundles: Arc<dyn BundleService>,
    pub ingestor: Arc<dyn IngestService>,
    pub events: EventBus,
}
