// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Quarantine entry and original-content cache (§3). Exclusively owned by
//! the Enforcer (§3 Ownership: "no other monitor may mutate them").

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

#[derive(Debug, Clone)]
pub struct QuarantineEntry {
    pub file_path: String,
    pub quarantine_path: String,
    pub stored_at: DateTime<Utc>,
    pub restore_at: DateTime<Utc>,
    pub reason_policy_ids: Vec<String>,
}

/// `file_path → bytes` captured at first observation of each file under a
/// monitored path (§3). Guarded by its own lock in the global ordering
/// (§5: "policy lock → content cache lock → quarantine lock → restored
/// lock"). LRU-evicted above `max_entries` (default 1000).
pub struct OriginalContentCache {
    max_entries: usize,
    inner: Mutex<LruMap>,
}

struct LruMap {
    // insertion order, oldest first; `entries` holds the actual bytes.
    order: Vec<String>,
    entries: HashMap<String, Vec<u8>>,
}

impl OriginalContentCache {
    pub fn new(max_entries: usize) -> Self {
        Self { max_entries, inner: Mutex::new(LruMap { order: Vec::new(), entries: HashMap::new() }) }
    }

    /// Inserted on first-create or baseline scan (§3 lifecycle). Overwriting
    /// an existing key does not change its original bytes at call sites —
    /// callers never call `insert` twice for the same `file_path` per the
    /// "do not overwrite the cache" rule in §4.5 step 7, but this method
    /// itself is total and will refresh the LRU position if called again.
    pub fn insert(&self, file_path: String, bytes: Vec<u8>) {
        let mut guard = self.inner.lock();
        if guard.entries.contains_key(&file_path) {
            guard.order.retain(|k| k != &file_path);
        } else if guard.entries.len() >= self.max_entries {
            if let Some(oldest) = guard.order.first().cloned() {
                guard.order.remove(0);
                guard.entries.remove(&oldest);
            }
        }
        guard.order.push(file_path.clone());
        guard.entries.insert(file_path, bytes);
    }

    pub fn get(&self, file_path: &str) -> Option<Vec<u8>> {
        self.inner.lock().entries.get(file_path).cloned()
    }

    pub fn contains(&self, file_path: &str) -> bool {
        self.inner.lock().entries.contains_key(file_path)
    }

    /// Cleared on successful restore (§3 lifecycle).
    pub fn remove(&self, file_path: &str) -> Option<Vec<u8>> {
        let mut guard = self.inner.lock();
        guard.order.retain(|k| k != file_path);
        guard.entries.remove(file_path)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }
}

/// Tracks paths the monitor must self-suppress events for while the
/// Enforcer is mid-quarantine or just finished restoring one (§4.5 step 4,
/// §4.9 step 4). Two disjoint sets, each its own lock per the global
/// ordering in §5.
#[derive(Default)]
pub struct SuppressionSets {
    being_quarantined: Mutex<std::collections::HashSet<String>>,
    recently_restored: Mutex<std::collections::HashSet<String>>,
}

impl SuppressionSets {
    pub fn mark_being_quarantined(&self, path: &str) {
        self.being_quarantined.lock().insert(path.to_string());
    }

    pub fn clear_being_quarantined(&self, path: &str) {
        self.being_quarantined.lock().remove(path);
    }

    pub fn mark_recently_restored(&self, path: &str) {
        self.recently_restored.lock().insert(path.to_string());
    }

    pub fn clear_recently_restored(&self, path: &str) {
        self.recently_restored.lock().remove(path);
    }

    pub fn should_suppress(&self, path: &str) -> bool {
        self.being_quarantined.lock().contains(path) || self.recently_restored.lock().contains(path)
    }
}
