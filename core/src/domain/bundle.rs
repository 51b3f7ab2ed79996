// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Policy bundle — the versioned, per-agent snapshot handed out by the
//! Bundle Assembler (§4.2). Determinism (Testable Property 1) is the whole
//! point of this module: the same enabled-policy set on the same platform
//! must always hash and serialize identically.

use serde::{Deserialize, Serialize};

use crate::domain::agent::Platform;
use crate::domain::policy::{Policy, PolicyAction, PolicyConfig, PolicyType, Severity};

/// Agent-facing shape of one policy inside a bundle (§6 `PolicyWire`:
/// `{id, name, enabled, action, config}`). `severity` is an additive field
/// beyond that four-field shape — see DESIGN.md's Open Question resolution:
/// the endpoint's Classifier needs a policy's severity to populate an
/// event's `severity` (§2, Scenario A), and the wire is the only channel
/// that can carry it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyWire {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub severity: Severity,
    pub action: PolicyAction,
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundlePolicies {
    #[serde(default)]
    pub file_system_monitoring: Vec<PolicyWire>,
    #[serde(default)]
    pub clipboard_monitoring: Vec<PolicyWire>,
    #[serde(default)]
    pub usb_device_monitoring: Vec<PolicyWire>,
    #[serde(default)]
    pub usb_file_transfer_monitoring: Vec<PolicyWire>,
    #[serde(default)]
    pub file_transfer_monitoring: Vec<PolicyWire>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyBundle {
    pub version: String,
    pub policy_count: usize,
    pub platform: Platform,
    pub policies: BundlePolicies,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncResponse {
    UpToDate,
    Bundle(PolicyBundle),
}

/// Deterministic hash over the ordered set of `(policy_id, updated_at,
/// enabled, type)` tuples for every enabled policy applicable to `platform`
/// (§3, §4.2 step 2). BLAKE3 is used purely because two bundles differing
/// only by policy content must differ in version with overwhelming
/// probability; this is advisory, not a cryptographic integrity guarantee
/// (Non-goals, §1).
pub fn compute_version(policies: &[&Policy]) -> String {
    let mut sorted: Vec<&&Policy> = policies.iter().collect();
    sorted.sort_by_key(|p| p.id.0);

    let mut hasher = blake3::Hasher::new();
    for policy in sorted {
        hasher.update(policy.id.0.as_bytes());
        hasher.update(&policy.updated_at.timestamp_millis().to_le_bytes());
        hasher.update(&[policy.enabled as u8]);
        hasher.update(policy.policy_type().wire_key().as_bytes());
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize().as_bytes())
}

/// Converts one policy's `config` into the wire shape. Returns `None` (and
/// the caller logs + excludes, per §4.2 edge cases) when the config does not
/// validate against its declared type.
pub fn to_wire(policy: &Policy) -> Option<PolicyWire> {
    policy.config.validate().ok()?;
    let config_json = config_to_json(&policy.config);
    Some(PolicyWire {
        id: policy.id.to_string(),
        name: policy.name.clone(),
        enabled: policy.enabled,
        severity: policy.severity,
        action: policy.config.action(),
        config: config_json,
    })
}

fn config_to_json(config: &PolicyConfig) -> serde_json::Value {
    match config {
        PolicyConfig::FileSystemMonitoring(c) | PolicyConfig::FileTransferMonitoring(c) => {
            // monitoredEvents = [] is emitted as [] verbatim, even when the
            // policy has other config present — the agent, not the
            // assembler, interprets empty as "all" (§4.2 edge cases).
            serde_json::json!({
                "monitoredPaths": c.monitored_paths,
                "fileExtensions": c.file_extensions,
                "monitoredEvents": c.monitored_events.iter().map(|e| e.wire()).collect::<Vec<_>>(),
                "patterns": {
                    "predefined": c.patterns_predefined,
                    "custom": c.patterns_custom,
                },
                "quarantinePath": c.quarantine_path,
                "minMatchCount": c.min_match_count,
            })
        }
        PolicyConfig::ClipboardMonitoring(c) => serde_json::json!({
            "patterns": {
                "predefined": c.patterns_predefined,
                "custom": c.patterns_custom,
            },
            "monitoredEvents": c.monitored_events.iter().map(|e| e.wire()).collect::<Vec<_>>(),
            "pollIntervalSeconds": c.poll_interval_seconds,
        }),
        PolicyConfig::UsbDeviceMonitoring(c) => serde_json::json!({
            "monitoredEvents": c.events.to_monitored_events().iter().map(|e| e.wire()).collect::<Vec<_>>(),
        }),
        PolicyConfig::UsbFileTransferMonitoring(c) => serde_json::json!({
            "monitoredPaths": c.monitored_paths,
            "quarantinePath": c.quarantine_path,
            "patterns": {
                "predefined": c.patterns_predefined,
                "custom": c.patterns_custom,
            },
        }),
    }
}

/// Assembles a [`PolicyBundle`] for `platform` from the given enabled
/// policies. Pure and total: iteration order of `enabled_policies` does not
/// affect the result (policies are grouped and the version hash sorts by id
/// internally). A policy enabled for `platform` is accepted even if it is of
/// a type the caller's agent doesn't support (§4.2: "the agent simply
/// ignores unknown types").
pub fn assemble(platform: Platform, enabled_policies: &[Policy]) -> PolicyBundle {
    let refs: Vec<&Policy> = enabled_policies.iter().collect();
    let version = compute_version(&refs);

    let mut policies = BundlePolicies::default();
    let mut count = 0usize;
    // Stable order: sort by policy_id so two assemblies of the same set are
    // byte-identical regardless of repository iteration order.
    let mut sorted = enabled_policies.to_vec();
    sorted.sort_by_key(|p| p.id.0);

    for policy in &sorted {
        let Some(wire) = to_wire(policy) else {
            tracing::warn!(policy_id = %policy.id, "excluding policy with invalid config from bundle");
            continue;
        };
        match policy.policy_type() {
            PolicyType::FileSystemMonitoring => policies.file_system_monitoring.push(wire),
            PolicyType::ClipboardMonitoring => policies.clipboard_monitoring.push(wire),
            PolicyType::UsbDeviceMonitoring => policies.usb_device_monitoring.push(wire),
            PolicyType::UsbFileTransferMonitoring => policies.usb_file_transfer_monitoring.push(wire),
            PolicyType::FileTransferMonitoring => policies.file_transfer_monitoring.push(wire),
            PolicyType::CloudStorageMonitoring => continue,
        }
        count += 1;
    }

    PolicyBundle {
        version,
        policy_count: count,
        platform,
        policies,
    }
}

/// Testable Property 2: `sync` short-circuits when the caller's installed
/// version already matches.
pub fn sync(platform: Platform, enabled_policies: &[Policy], installed_version: Option<&str>) -> SyncResponse {
    let refs: Vec<&Policy> = enabled_policies.iter().collect();
    let version = compute_version(&refs);
    if Some(version.as_str()) == installed_version {
        return SyncResponse::UpToDate;
    }
    SyncResponse::Bundle(assemble(platform, enabled_policies))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::policy::{FileMonitoringConfig, PolicyId, Severity};
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn file_policy(enabled: bool) -> Policy {
        Policy {
            id: PolicyId::new(),
            name: "ssn-watch".into(),
            description: "".into(),
            severity: Severity::Critical,
            priority: 10,
            enabled,
            config: PolicyConfig::FileSystemMonitoring(FileMonitoringConfig {
                monitored_paths: BTreeSet::from(["/tmp/watch".to_string()]),
                file_extensions: BTreeSet::from([".txt".to_string()]),
                monitored_events: vec![crate::domain::policy::MonitoredEvent::FileModified],
                patterns_predefined: vec!["ssn".into()],
                patterns_custom: vec![],
                action: PolicyAction::Quarantine,
                quarantine_path: Some("/tmp/quarantine".into()),
                min_match_count: 1,
            }),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn bundle_is_deterministic_across_two_calls() {
        let policies = vec![file_policy(true)];
        let a = assemble(Platform::Linux, &policies);
        let b = assemble(Platform::Linux, &policies);
        assert_eq!(a.version, b.version);
        assert_eq!(
            serde_json::to_string(&a.policies).unwrap(),
            serde_json::to_string(&b.policies).unwrap()
        );
    }

    #[test]
    fn up_to_date_short_circuits() {
        let policies = vec![file_policy(true)];
        let bundle = assemble(Platform::Linux, &policies);
        match sync(Platform::Linux, &policies, Some(&bundle.version)) {
            SyncResponse::UpToDate => {}
            SyncResponse::Bundle(_) => panic!("expected up_to_date"),
        }
    }

    #[test]
    fn version_changes_when_a_policy_is_enabled() {
        let mut policies = vec![file_policy(true)];
        let v1 = compute_version(&policies.iter().collect::<Vec<_>>());
        policies.push({
            let mut p = file_policy(false);
            p.id = PolicyId::new();
            p
        });
        // disabled policy must not be fed into the hash by callers — only
        // enabled policies are passed to compute_version/assemble.
        let v_same = compute_version(&[&policies[0]]);
        assert_eq!(v1, v_same);

        policies[1].enabled = true;
        let v2 = compute_version(&policies.iter().collect::<Vec<_>>());
        assert_ne!(v1, v2);
    }
}
