// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! The Classifier: a pure function from `(content, event_subtype, policies)`
//! to a classification result (§2, §4.*). Used identically on the endpoint
//! (advisory) and on the manager (authoritative re-evaluation, §4.3) — the
//! same function, not two implementations, so Testable Property 6
//! ("classification purity") holds trivially and re-evaluation can never
//! drift from the endpoint's logic by accident.

use serde::{Deserialize, Serialize};

use crate::domain::detectors::{self, canonicalize};
use crate::domain::policy::{MonitoredEvent, Policy, PolicyAction, PolicyId, Severity};

const REDACTED: &str = "[REDACTED]";
const MAX_SAMPLES_PER_TYPE: usize = 3;
const MAX_SAMPLE_LEN: usize = 40;

/// Data types whose name contains any of these substrings are always
/// redacted in the summary, never shown in the clear (§4.6 redaction rule,
/// applied generically — see DESIGN.md for the reasoning).
const ALWAYS_REDACT_SUBSTRINGS: &[&str] = &["password", "api_key", "secret", "token", "private_key"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedDataType {
    pub data_type: String,
    pub samples: Vec<String>,
    pub count: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub matched_policies: Vec<PolicyId>,
    pub data_types: Vec<DetectedDataType>,
    pub total_matches: u32,
    pub severity: Option<Severity>,
    pub suggested_action: Option<PolicyAction>,
}

impl ClassificationResult {
    pub fn is_empty(&self) -> bool {
        self.matched_policies.is_empty()
    }

    /// Bare data-type names for the event's flat `data_types` field (§3),
    /// distinct from `detected_content`'s per-type sample detail.
    pub fn data_type_names(&self) -> Vec<String> {
        self.data_types.iter().map(|d| d.data_type.clone()).collect()
    }
}

fn should_redact(canonical_data_type: &str) -> bool {
    let lower = canonical_data_type.to_ascii_lowercase();
    ALWAYS_REDACT_SUBSTRINGS.iter().any(|s| lower.contains(s))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// Counts matches for one policy's configured pattern names (predefined +
/// custom, after alias resolution) against `content`, returning the
/// per-data-type matches found. Unknown pattern names contribute nothing
/// (§7 total classifier).
fn run_patterns(content: &str, predefined: &[String], custom: &[String]) -> Vec<detectors::DetectorMatch> {
    let mut out = Vec::new();
    for name in predefined.iter().chain(custom.iter()) {
        let Some(canonical) = canonicalize(name) else {
            continue;
        };
        out.extend(detectors::detect(canonical, content));
    }
    out
}

/// `classify` never panics, never performs I/O, and never mutates anything
/// it is given — a pure function of its three inputs (Testable Property 6).
/// `policies` must already be filtered to the ones applicable to
/// `event_subtype` by the caller (monitor filtering, §4.5 step 1-2, or the
/// ingestor re-evaluating against the full current store, §4.3).
pub fn classify(content: &str, event_subtype: MonitoredEvent, policies: &[&Policy]) -> ClassificationResult {
    let mut result = ClassificationResult::default();
    let mut data_type_matches: std::collections::BTreeMap<&'static str, Vec<String>> = Default::default();

    for policy in policies {
        if !policy.enabled {
            continue;
        }
        if !policy.config.matches_subtype(event_subtype) {
            continue;
        }

        let (predefined, custom, min_match_count): (&[String], &[String], u32) = match &policy.config {
            crate::domain::policy::PolicyConfig::FileSystemMonitoring(c)
            | crate::domain::policy::PolicyConfig::FileTransferMonitoring(c) => {
                (&c.patterns_predefined, &c.patterns_custom, c.min_match_count)
            }
            crate::domain::policy::PolicyConfig::ClipboardMonitoring(c) => {
                (&c.patterns_predefined, &c.patterns_custom, 1)
            }
            crate::domain::policy::PolicyConfig::UsbFileTransferMonitoring(c) => {
                (&c.patterns_predefined, &c.patterns_custom, 1)
            }
            crate::domain::policy::PolicyConfig::UsbDeviceMonitoring(_) => {
                // USB device connect/disconnect events carry no content to
                // classify; a matching policy always "matches" on subtype
                // alone.
                result.matched_policies.push(policy.id);
                result.severity = Some(result.severity.map_or(policy.severity, |s| s.max(policy.severity)));
                result.suggested_action =
                    Some(result.suggested_action.map_or(policy.config.action(), |a| a.max(policy.config.action())));
                continue;
            }
        };

        if predefined.is_empty() && custom.is_empty() {
            // No pattern detectors configured: a path/subtype match alone is
            // sufficient (used by usb_file_transfer_monitoring without
            // content-aware blocking, §4.8).
            result.matched_policies.push(policy.id);
            result.severity = Some(result.severity.map_or(policy.severity, |s| s.max(policy.severity)));
            result.suggested_action =
                Some(result.suggested_action.map_or(policy.config.action(), |a| a.max(policy.config.action())));
            continue;
        }

        let matches = run_patterns(content, predefined, custom);
        if matches.len() as u32 >= min_match_count.max(1) && !matches.is_empty() {
            result.matched_policies.push(policy.id);
            result.severity = Some(result.severity.map_or(policy.severity, |s| s.max(policy.severity)));
            result.suggested_action =
                Some(result.suggested_action.map_or(policy.config.action(), |a| a.max(policy.config.action())));
            for m in matches {
                data_type_matches.entry(m.data_type).or_default().push(m.sample);
            }
        }
    }

    let mut total = 0u32;
    for (data_type, samples) in data_type_matches {
        total += samples.len() as u32;
        let redacted = should_redact(data_type);
        let shown: Vec<String> = if redacted {
            vec![REDACTED.to_string()]
        } else {
            samples.iter().take(MAX_SAMPLES_PER_TYPE).map(|s| truncate(s, MAX_SAMPLE_LEN)).collect()
        };
        result.data_types.push(DetectedDataType {
            data_type: data_type.to_string(),
            samples: shown,
            count: samples.len() as u32,
        });
    }
    result.total_matches = total;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::policy::{FileMonitoringConfig, PolicyConfig, Severity};
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn ssn_policy() -> Policy {
        Policy {
            id: PolicyId::new(),
            name: "ssn".into(),
            description: "".into(),
            severity: Severity::Critical,
            priority: 5,
            enabled: true,
            config: PolicyConfig::FileSystemMonitoring(FileMonitoringConfig {
                monitored_paths: BTreeSet::from(["/tmp/watch".into()]),
                file_extensions: BTreeSet::new(),
                monitored_events: vec![MonitoredEvent::FileModified],
                patterns_predefined: vec!["ssn".into()],
                patterns_custom: vec![],
                action: PolicyAction::Quarantine,
                quarantine_path: Some("/tmp/q".into()),
                min_match_count: 1,
            }),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn classify_is_pure_and_matches_ssn() {
        let policy = ssn_policy();
        let result = classify("SSN: 123-45-6789", MonitoredEvent::FileModified, &[&policy]);
        assert_eq!(result.matched_policies, vec![policy.id]);
        assert_eq!(result.total_matches, 1);
        assert_eq!(result.severity, Some(Severity::Critical));
        assert_eq!(result.suggested_action, Some(PolicyAction::Quarantine));
    }

    #[test]
    fn subtype_filtering_excludes_non_matching_policies() {
        let policy = ssn_policy();
        let result = classify("SSN: 123-45-6789", MonitoredEvent::FileDeleted, &[&policy]);
        assert!(result.is_empty());
    }

    #[test]
    fn unmatched_content_yields_no_matches() {
        let policy = ssn_policy();
        let result = classify("hello world, nothing sensitive here", MonitoredEvent::FileModified, &[&policy]);
        assert!(result.is_empty());
    }

    #[test]
    fn min_match_count_gate() {
        let mut policy = ssn_policy();
        if let PolicyConfig::FileSystemMonitoring(c) = &mut policy.config {
            c.min_match_count = 2;
        }
        let result = classify("SSN: 123-45-6789", MonitoredEvent::FileModified, &[&policy]);
        assert!(result.is_empty());

        let result = classify("123-45-6789 and 987-65-4320", MonitoredEvent::FileModified, &[&policy]);
        assert_eq!(result.total_matches, 2);
    }
}
