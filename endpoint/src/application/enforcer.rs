// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! The Enforcer (§4.9): quarantine protocol with restoration, delete
//! interception, and the block action. Exclusive owner of the
//! original-content cache and the quarantine/restored suppression sets
//! (§3 Ownership).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cybersentinel_core::domain::event::EventAction;
use cybersentinel_core::domain::policy::PolicyAction;

use crate::domain::{Clock, OriginalContentCache, SuppressionSets};

#[derive(Debug, thiserror::Error)]
pub enum EnforcerError {
    #[error("io error on {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
}

/// Outcome of one enforcement call; feeds directly into the emitted event's
/// `action` field (§4.9 "every enforcement action produces exactly one
/// event regardless of retry").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnforcementOutcome {
    Logged,
    Alerted,
    Quarantined,
    QuarantinedOnDelete,
    Deleted,
    QuarantineFailed,
    BlockFailed,
}

impl From<EnforcementOutcome> for EventAction {
    fn from(o: EnforcementOutcome) -> Self {
        match o {
            EnforcementOutcome::Logged => EventAction::Logged,
            EnforcementOutcome::Alerted => EventAction::Alerted,
            EnforcementOutcome::Quarantined => EventAction::Quarantined,
            EnforcementOutcome::QuarantinedOnDelete => EventAction::QuarantinedOnDelete,
            EnforcementOutcome::Deleted => EventAction::Deleted,
            EnforcementOutcome::QuarantineFailed => EventAction::QuarantineFailed,
            EnforcementOutcome::BlockFailed => EventAction::BlockFailed,
        }
    }
}

/// Resolves the single effective action across multiple matched policies on
/// one event: `block > quarantine > alert > log`; ties broken by lowest
/// `priority` (§4.9 "Ordering across multiple matched policies").
pub fn highest_priority_action(matches: &[(PolicyAction, i32)]) -> Option<PolicyAction> {
    matches
        .iter()
        .min_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)))
        .map(|(action, _)| *action)
}

pub struct Enforcer {
    content_cache: Arc<OriginalContentCache>,
    suppression: Arc<SuppressionSets>,
    clock: Arc<dyn Clock>,
    restoration_window: chrono::Duration,
    restored_grace: chrono::Duration,
}

impl Enforcer {
    pub fn new(
        content_cache: Arc<OriginalContentCache>,
        suppression: Arc<SuppressionSets>,
        clock: Arc<dyn Clock>,
        restoration_window: chrono::Duration,
        restored_grace: chrono::Duration,
    ) -> Self {
        Self { content_cache, suppression, clock, restoration_window, restored_grace }
    }

    fn quarantine_file_name(&self, original: &Path) -> String {
        let epoch_ns = self.clock.now().timestamp_nanos_opt().unwrap_or_default();
        let basename = original.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        format!("{epoch_ns}_{basename}")
    }

    /// §4.9 "Quarantine protocol" steps 1-3: mark suppressed, atomically move
    /// the file, schedule restoration. Returns the quarantine file path and
    /// spawns the restore task; the caller is responsible for emitting the
    /// event with [`EnforcementOutcome::Quarantined`] or
    /// [`EnforcementOutcome::QuarantineFailed`].
    pub async fn quarantine(self: &Arc<Self>, path: &str, quarantine_dir: &str) -> Result<PathBuf, EnforcerError> {
        self.suppression.mark_being_quarantined(path);
        let original = Path::new(path);
        let quarantine_path = Path::new(quarantine_dir).join(self.quarantine_file_name(original));

        if let Some(parent) = quarantine_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| EnforcerError::Io { path: path.to_string(), source: e })?;
        }
        let move_result = tokio::fs::rename(original, &quarantine_path).await;
        if let Err(e) = move_result {
            self.suppression.clear_being_quarantined(path);
            return Err(EnforcerError::Io { path: path.to_string(), source: e });
        }

        self.schedule_restoration(path.to_string(), quarantine_path.clone());
        Ok(quarantine_path)
    }

    /// §4.9 "Delete interception": the OS already removed the file; write
    /// the cached bytes into the quarantine directory as a "saved copy" and
    /// schedule restoration to the original path.
    pub async fn quarantine_on_delete(self: &Arc<Self>, path: &str, quarantine_dir: &str) -> Result<(), EnforcerError> {
        let Some(bytes) = self.content_cache.get(path) else {
            return Ok(());
        };
        let original = Path::new(path);
        let quarantine_path = Path::new(quarantine_dir).join(self.quarantine_file_name(original));
        if let Some(parent) = quarantine_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| EnforcerError::Io { path: path.to_string(), source: e })?;
        }
        tokio::fs::write(&quarantine_path, &bytes).await.map_err(|e| EnforcerError::Io { path: path.to_string(), source: e })?;
        self.schedule_restoration(path.to_string(), quarantine_path);
        Ok(())
    }

    /// §4.9 "Block action (file): remove the file; emit `deleted` action."
    pub async fn block_delete(&self, path: &str) -> Result<(), EnforcerError> {
        tokio::fs::remove_file(path).await.map_err(|e| EnforcerError::Io { path: path.to_string(), source: e })
    }

    fn schedule_restoration(self: &Arc<Self>, original_path: String, quarantine_path: PathBuf) {
        let enforcer = Arc::clone(self);
        let delay = self.restoration_window.to_std().unwrap_or(std::time::Duration::from_secs(600));
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            enforcer.restore_now(&original_path, &quarantine_path).await;
        });
    }

    /// §4.9 step 4: restore the original bytes (preferred) or the quarantine
    /// file itself, mark `recently_restored`, and after the grace period
    /// clear it. Failures are logged; on write failure fall back to
    /// restoring the quarantine file (step 5).
    pub async fn restore_now(self: &Arc<Self>, original_path: &str, quarantine_path: &Path) {
        let restored = if let Some(bytes) = self.content_cache.get(original_path) {
            if let Some(parent) = Path::new(original_path).parent() {
                let _ = tokio::fs::create_dir_all(parent).await;
            }
            match tokio::fs::write(original_path, &bytes).await {
                Ok(()) => {
                    let _ = tokio::fs::remove_file(quarantine_path).await;
                    self.content_cache.remove(original_path);
                    true
                }
                Err(e) => {
                    tracing::warn!(path = original_path, error = %e, "failed to write cached bytes, falling back to moving quarantine file back");
                    tokio::fs::rename(quarantine_path, original_path).await.is_ok()
                }
            }
        } else {
            tokio::fs::rename(quarantine_path, original_path).await.is_ok()
        };

        if !restored {
            tracing::error!(path = original_path, "restoration failed: original and quarantine copy both unavailable");
        }

        self.suppression.mark_recently_restored(original_path);
        self.suppression.clear_being_quarantined(original_path);

        let grace = self.restored_grace.to_std().unwrap_or(std::time::Duration::from_secs(30));
        let suppression = Arc::clone(&self.suppression);
        let path = original_path.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            suppression.clear_recently_restored(&path);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SystemClock;

    fn enforcer() -> Arc<Enforcer> {
        Arc::new(Enforcer::new(
            Arc::new(OriginalContentCache::new(1000)),
            Arc::new(SuppressionSets::default()),
            Arc::new(SystemClock),
            chrono::Duration::seconds(1),
            chrono::Duration::milliseconds(50),
        ))
    }

    #[test]
    fn ordering_picks_block_over_quarantine_then_priority_tiebreak() {
        let matches = vec![(PolicyAction::Quarantine, 10), (PolicyAction::Block, 5), (PolicyAction::Block, 1)];
        assert_eq!(highest_priority_action(&matches), Some(PolicyAction::Block));
    }

    #[test]
    fn ordering_tiebreaks_on_lowest_priority() {
        let matches = vec![(PolicyAction::Alert, 20), (PolicyAction::Alert, 3)];
        assert_eq!(highest_priority_action(&matches), Some(PolicyAction::Alert));
    }

    #[tokio::test]
    async fn restoration_faithfulness_writes_back_original_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("x.txt");
        tokio::fs::write(&original, b"hello").await.unwrap();
        let enforcer = enforcer();
        enforcer.content_cache.insert(original.to_string_lossy().to_string(), b"hello".to_vec());

        let quarantine_dir = dir.path().join("quarantine");
        let qpath = quarantine_dir.join("123_x.txt");
        tokio::fs::create_dir_all(&quarantine_dir).await.unwrap();
        tokio::fs::rename(&original, &qpath).await.unwrap();

        enforcer.restore_now(&original.to_string_lossy(), &qpath).await;

        let restored = tokio::fs::read(&original).await.unwrap();
        assert_eq!(restored, b"hello");
        assert!(!qpath.exists());
        assert!(enforcer.suppression.should_suppress(&original.to_string_lossy()));
    }

    #[tokio::test]
    async fn restore_without_cached_bytes_moves_quarantine_file_back() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("y.txt");
        let quarantine_dir = dir.path().join("quarantine");
        tokio::fs::create_dir_all(&quarantine_dir).await.unwrap();
        let qpath = quarantine_dir.join("456_y.txt");
        tokio::fs::write(&qpath, b"card data").await.unwrap();

        let enforcer = enforcer();
        enforcer.restore_now(&original.to_string_lossy(), &qpath).await;

        assert_eq!(tokio::fs::read(&original).await.unwrap(), b"card data");
        assert!(!qpath.exists());
    }
}
