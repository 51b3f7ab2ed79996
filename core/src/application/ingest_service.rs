// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Event Ingestor application service (§4.3). Validates, deduplicates on
//! `event_id` (Testable Property 3), re-evaluates against the *current*
//! Policy Store using the same Classifier the endpoint runs (§9
//! "Re-evaluation on the manager"), and persists.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::domain::classifier;
use crate::domain::error::ManagerError;
use crate::domain::event::{Event, EventQuery, Reevaluation};
use crate::domain::policy::{MonitoredEvent, Policy, PolicyType};
use crate::domain::repository::{EventRepository, InsertOutcome, PolicyRepository};

/// What the ingestor needs beyond the immutable `Event` record: the raw
/// content observed at the source, used only for re-evaluation and never
/// persisted (the stored record keeps only the `detected_content` summary,
/// per §3's event shape).
pub struct IngestRequest {
    pub event: Event,
    pub raw_content: Option<String>,
}

#[async_trait]
pub trait IngestService: Send + Sync {
    async fn ingest(&self, request: IngestRequest) -> Result<Event, ManagerError>;
    async fn query(&self, query: EventQuery) -> Result<(Vec<Event>, usize), ManagerError>;
}

fn event_subtype_to_monitored(subtype: crate::domain::event::EventSubtype) -> Option<MonitoredEvent> {
    use crate::domain::event::EventSubtype as S;
    Some(match subtype {
        S::FileCreated => MonitoredEvent::FileCreated,
        S::FileModified => MonitoredEvent::FileModified,
        S::FileDeleted => MonitoredEvent::FileDeleted,
        S::FileRenamed => MonitoredEvent::FileRenamed,
        S::ClipboardCopy => MonitoredEvent::ClipboardCopy,
        S::UsbConnect => MonitoredEvent::UsbConnect,
        S::UsbDisconnect => MonitoredEvent::UsbDisconnect,
        S::UsbFileTransfer => MonitoredEvent::UsbFileTransfer,
        S::UsbBlocked | S::TransferBlocked => return None,
    })
}

fn policy_types_for_event_type(event_type: crate::domain::event::EventType) -> &'static [PolicyType] {
    use crate::domain::event::EventType as T;
    match event_type {
        T::File => &[PolicyType::FileSystemMonitoring, PolicyType::FileTransferMonitoring],
        T::Clipboard => &[PolicyType::ClipboardMonitoring],
        T::Usb => &[PolicyType::UsbDeviceMonitoring, PolicyType::UsbFileTransferMonitoring],
    }
}

pub struct DefaultIngestService {
    event_repo: Arc<dyn EventRepository>,
    policy_repo: Arc<dyn PolicyRepository>,
    /// Approximate in-flight queue depth used for back-pressure (§4.3,
    /// §5 "Manager concurrency"). Not a precise queue — a coarse admission
    /// gate around the high-water mark, reset as requests complete.
    in_flight: AtomicUsize,
    high_water_mark: usize,
}

impl DefaultIngestService {
    pub fn new(event_repo: Arc<dyn EventRepository>, policy_repo: Arc<dyn PolicyRepository>, high_water_mark: usize) -> Self {
        Self { event_repo, policy_repo, in_flight: AtomicUsize::new(0), high_water_mark }
    }

    async fn reevaluate(&self, event: &Event, raw_content: Option<&str>) -> Result<Option<Reevaluation>, ManagerError> {
        let Some(subtype) = event_subtype_to_monitored(event.event_subtype) else {
            return Ok(None);
        };
        let types = policy_types_for_event_type(event.event_type);
        let policies: Vec<Policy> = self.policy_repo.list_enabled_by_type(types).await?;
        let refs: Vec<&Policy> = policies.iter().collect();
        let content = raw_content.unwrap_or("");
        let result = classifier::classify(content, subtype, &refs);
        Ok(Some(Reevaluation::from_classification(&result)))
    }
}

#[async_trait]
impl IngestService for DefaultIngestService {
    async fn ingest(&self, request: IngestRequest) -> Result<Event, ManagerError> {
        let depth = self.in_flight.fetch_add(1, Ordering::SeqCst);
        struct Guard<'a>(&'a AtomicUsize);
        impl Drop for Guard<'_> {
            fn drop(&mut self) {
                self.0.fetch_sub(1, Ordering::SeqCst);
            }
        }
        let _guard = Guard(&self.in_flight);

        if depth >= self.high_water_mark {
            return Err(ManagerError::Busy);
        }

        let IngestRequest { mut event, raw_content } = request;
        event.validate().map_err(|e| ManagerError::InvalidEvent(e.to_string()))?;

        // Re-evaluate before persisting: once stored, an event is immutable
        // (§3), so both views must be finalized in the same write.
        event.reevaluation = self.reevaluate(&event, raw_content.as_deref()).await?;

        match self.event_repo.insert_if_absent(event).await? {
            InsertOutcome::Inserted(stored) => Ok(stored),
            // Idempotent: the caller gets the same record back, not an
            // error (§4.3 step 2, §7, Testable Property 3).
            InsertOutcome::AlreadyPresent(stored) => Ok(stored),
        }
    }

    async fn query(&self, query: EventQuery) -> Result<(Vec<Event>, usize), ManagerError> {
        Ok(self.event_repo.query(query).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::AgentId;
    use crate::domain::event::{DetectedContentSummary, EventAction, EventSubtype, EventType, SourceType};
    use crate::domain::policy::Severity;
    use crate::infrastructure::repositories::in_memory::{InMemoryEventRepository, InMemoryPolicyRepository};
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_event(event_id: Uuid) -> Event {
        Event {
            event_id,
            agent_id: AgentId::new(),
            source_type: SourceType::Agent,
            event_type: EventType::File,
            event_subtype: EventSubtype::FileModified,
            severity: Severity::Low,
            action: EventAction::Logged,
            file_path: Some("/tmp/watch/x.txt".into()),
            file_name: Some("x.txt".into()),
            file_size: Some(5),
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

    fn service() -> DefaultIngestService {
        DefaultIngestService::new(
            Arc::new(InMemoryEventRepository::new()),
            Arc::new(InMemoryPolicyRepository::new()),
            1000,
        )
    }

    #[tokio::test]
    async fn ingest_is_idempotent_on_event_id() {
        let svc = service();
        let id = Uuid::new_v4();
        let a = svc.ingest(IngestRequest { event: sample_event(id), raw_content: None }).await.unwrap();
        let b = svc.ingest(IngestRequest { event: sample_event(id), raw_content: None }).await.unwrap();
        assert_eq!(a.event_id, b.event_id);
        let (all, total) = svc.query(EventQuery::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn ingest_rejects_nil_event_id() {
        let svc = service();
        let event = sample_event(Uuid::nil());
        let err = svc.ingest(IngestRequest { event, raw_content: None }).await.unwrap_err();
        assert!(matches!(err, ManagerError::InvalidEvent(_)));
    }

    #[tokio::test]
    async fn ingest_attaches_reevaluation() {
        let svc = service();
        let event = sample_event(Uuid::new_v4());
        let stored = svc
            .ingest(IngestRequest { event, raw_content: Some("SSN: 123-45-6789".into()) })
            .await
            .unwrap();
        assert!(stored.reevaluation.is_some());
    }
}
