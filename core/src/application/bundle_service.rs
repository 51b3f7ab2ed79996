// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Bundle Assembler application service (§4.2). Wraps the pure
//! `domain::bundle` functions with repository access; the assembly itself
//! stays pure and is unit-tested directly against `domain::bundle`.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::agent::Platform;
use crate::domain::bundle::{self, SyncResponse};
use crate::domain::error::ManagerError;
use crate::domain::policy::PolicyType;
use crate::domain::repository::PolicyRepository;

const ALL_TYPES: &[PolicyType] = &[
    PolicyType::FileSystemMonitoring,
    PolicyType::ClipboardMonitoring,
    PolicyType::UsbDeviceMonitoring,
    PolicyType::UsbFileTransferMonitoring,
    PolicyType::FileTransferMonitoring,
];

#[async_trait]
pub trait BundleService: Send + Sync {
    async fn sync(&self, platform: Platform, installed_version: Option<&str>) -> Result<SyncResponse, ManagerError>;
}

pub struct DefaultBundleService {
    policy_repo: Arc<dyn PolicyRepository>,
}

impl DefaultBundleService {
    pub fn new(policy_repo: Arc<dyn PolicyRepository>) -> Self {
        Self { policy_repo }
    }
}

#[async_trait]
impl BundleService for DefaultBundleService {
    async fn sync(&self, platform: Platform, installed_version: Option<&str>) -> Result<SyncResponse, ManagerError> {
        // Bundles are scoped by platform only, not by the caller's declared
        // capabilities (Open Question in §9 — resolved in DESIGN.md): an
        // agent without clipboard support still receives clipboard policies
        // and ignores them, matching "a policy enabled for a type the agent
        // does not support is included" (§4.2 edge cases).
        let enabled = self.policy_repo.list_enabled_by_type(ALL_TYPES).await?;
        Ok(bundle::sync(platform, &enabled, installed_version))
    }
}
