// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Event dedup map: `(path, subtype) → last_seen_time`, its own lock,
//! independent of the policy/cache/quarantine/restored lock chain (§5).
//! Suppresses identical `(path, subtype)` pairs observed within the dedup
//! window — OS watchers often emit bursts (§4.5 step 3).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::domain::Clock;

#[derive(Default)]
pub struct DedupMap {
    inner: Mutex<HashMap<(String, String), DateTime<Utc>>>,
}

impl DedupMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this `(path, subtype)` pair was already seen within
    /// `window`; otherwise records `now` and returns `false`. Entries older
    /// than the window are evicted lazily on the path they're looked up on,
    /// per §5 ("entries older than the dedup window may be lazily
    /// evicted").
    pub fn should_suppress(&self, path: &str, subtype: &str, window: chrono::Duration, clock: &dyn Clock) -> bool {
        let now = clock.now();
        let key = (path.to_string(), subtype.to_string());
        let mut guard = self.inner.lock();
        match guard.get(&key) {
            Some(last_seen) if now - *last_seen < window => true,
            _ => {
                guard.insert(key, now);
                false
            }
        }
    }

    pub fn evict_older_than(&self, window: chrono::Duration, clock: &dyn Clock) {
        let now = clock.now();
        self.inner.lock().retain(|_, seen| now - *seen < window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FakeClock;

    #[test]
    fn second_identical_event_within_window_is_suppressed() {
        let clock = FakeClock::new(Utc::now());
        let map = DedupMap::new();
        let window = chrono::Duration::seconds(2);
        assert!(!map.should_suppress("/tmp/x.txt", "file_modified", window, &clock));
        assert!(map.should_suppress("/tmp/x.txt", "file_modified", window, &clock));
    }

    #[test]
    fn event_after_window_elapses_is_not_suppressed() {
        let clock = FakeClock::new(Utc::now());
        let map = DedupMap::new();
        let window = chrono::Duration::seconds(2);
        assert!(!map.should_suppress("/tmp/x.txt", "file_modified", window, &clock));
        clock.advance(chrono::Duration::seconds(3));
        assert!(!map.should_suppress("/tmp/x.txt", "file_modified", window, &clock));
    }
}
