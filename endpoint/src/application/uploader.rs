// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Event Uploader (§4.10): bounded in-process queue with oldest-drop-on-full
//! back-pressure, retry with capped exponential backoff on transient
//! failures (delegated to [`cybersentinel_agent_sdk::ManagerClient`]), drops
//! newly-generated events when `allow_events = false`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use cybersentinel_agent_sdk::ManagerClient;
use cybersentinel_core::domain::event::Event;
use tokio::sync::Notify;

const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
const MAX_RETRY_ATTEMPTS: u32 = 6;

struct QueuedEvent {
    event: Event,
    content: Option<String>,
}

/// Ring buffer backing the outbound queue: a plain `VecDeque` guarded by a
/// mutex plus a `Notify` to wake the draining task, rather than an mpsc
/// channel — `try_send` on a channel can only reject the event being
/// pushed, but §4.10 requires the *oldest* queued event to go, so the
/// handle needs to reach into the queue itself.
struct Ring {
    queue: Mutex<VecDeque<QueuedEvent>>,
    notify: Notify,
    capacity: usize,
}

impl Ring {
    fn push(&self, item: QueuedEvent) {
        let mut queue = self.queue.lock().unwrap();
        if queue.len() >= self.capacity {
            if let Some(dropped) = queue.pop_front() {
                tracing::warn!(event_id = %dropped.event.event_id, "event queue full, dropping oldest event");
            }
        }
        queue.push_back(item);
        drop(queue);
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<QueuedEvent> {
        self.queue.lock().unwrap().pop_front()
    }
}

/// Handle held by monitors/enforcer to enqueue events; cheap to clone.
#[derive(Clone)]
pub struct UploaderHandle {
    ring: Arc<Ring>,
    allow_events: Arc<AtomicBool>,
}

impl UploaderHandle {
    /// §4.10 "Drops newly-generated events when `allow_events = false`";
    /// §8 Testable Property 10. Never blocks the caller — pushing onto the
    /// ring buffer is a bounded, non-blocking mutex section.
    pub fn enqueue(&self, event: Event, content: Option<String>) {
        if !self.allow_events.load(Ordering::Relaxed) {
            tracing::debug!(event_id = %event.event_id, "allow_events=false, dropping newly generated event");
            return;
        }
        // Full queue: drop the oldest already-queued event to make room for
        // this one (§5 "overflow drops oldest"), not the event arriving now.
        self.ring.push(QueuedEvent { event, content });
    }

    pub fn set_allow_events(&self, allow: bool) {
        self.allow_events.store(allow, Ordering::Relaxed);
    }
}

pub struct Uploader {
    client: ManagerClient,
    ring: Arc<Ring>,
}

impl Uploader {
    pub fn new(client: ManagerClient) -> (Self, UploaderHandle) {
        let ring = Arc::new(Ring { queue: Mutex::new(VecDeque::new()), notify: Notify::new(), capacity: DEFAULT_QUEUE_CAPACITY });
        let allow_events = Arc::new(AtomicBool::new(false));
        (Self { client, ring: Arc::clone(&ring) }, UploaderHandle { ring, allow_events })
    }

    /// Drains the queue forever, submitting each event with retry/backoff.
    /// Runs as its own Tokio task; never blocks a monitor (§5).
    pub async fn run(self, shutdown: tokio_util::sync::CancellationToken) {
        loop {
            match self.ring.pop() {
                Some(queued) => self.submit(queued).await,
                None => {
                    tokio::select! {
                        _ = shutdown.cancelled() => {
                            // Drain whatever is already queued before exiting —
                            // "already-queued events are still sent" (§4.10).
                            while let Some(queued) = self.ring.pop() {
                                self.submit(queued).await;
                            }
                            return;
                        }
                        _ = self.ring.notify.notified() => {}
                    }
                }
            }
        }
    }

    async fn submit(&self, queued: QueuedEvent) {
        match self.client.submit_event_with_retry(&queued.event, queued.content.as_deref(), MAX_RETRY_ATTEMPTS).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(event_id = %queued.event.event_id, "event dropped after rejection"),
            Err(e) => tracing::error!(event_id = %queued.event.event_id, error = %e, "event submission exhausted retries"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cybersentinel_core::domain::agent::AgentId;
    use cybersentinel_core::domain::event::{DetectedContentSummary, EventAction, EventSubtype, EventType, SourceType};
    use cybersentinel_core::domain::policy::Severity;
    use uuid::Uuid;

    fn sample_event() -> Event {
        Event {
            event_id: Uuid::new_v4(),
            agent_id: AgentId::new(),
            source_type: SourceType::Agent,
            event_type: EventType::File,
            event_subtype: EventSubtype::FileModified,
            severity: Severity::Low,
            action: EventAction::Logged,
            file_path: None,
            file_name: None,
            file_size: None,
            file_hash: None,
            detected_content: DetectedContentSummary::default(),
            data_types: vec![],
            matched_policies: vec![],
            total_matches: 0,
            device_name: None,
            device_id: None,
            vendor_id: None,
            product_id: None,
            description: None,
            user_email: None,
            timestamp: Utc::now(),
            reevaluation: None,
        }
    }

    #[test]
    fn disallowed_events_are_dropped_without_reaching_the_queue() {
        let client = ManagerClient::new("http://127.0.0.1:1");
        let (uploader, handle) = Uploader::new(client);
        handle.set_allow_events(false);
        handle.enqueue(sample_event(), None);
        assert!(uploader.ring.queue.lock().unwrap().is_empty());
    }

    #[test]
    fn full_queue_drops_the_oldest_event_not_the_newest() {
        let client = ManagerClient::new("http://127.0.0.1:1");
        let (uploader, handle) = Uploader::new(client);
        handle.set_allow_events(true);

        let mut oldest = sample_event();
        oldest.description = Some("oldest".to_string());
        {
            let mut queue = uploader.ring.queue.lock().unwrap();
            queue.push_back(QueuedEvent { event: oldest, content: None });
            for _ in 1..DEFAULT_QUEUE_CAPACITY {
                queue.push_back(QueuedEvent { event: sample_event(), content: None });
            }
        }

        let mut newest = sample_event();
        newest.description = Some("newest".to_string());
        handle.enqueue(newest, None);

        let queue = uploader.ring.queue.lock().unwrap();
        assert_eq!(queue.len(), DEFAULT_QUEUE_CAPACITY);
        assert!(queue.iter().all(|q| q.event.description.as_deref() != Some("oldest")));
        assert!(queue.iter().any(|q| q.event.description.as_deref() == Some("newest")));
    }
}
