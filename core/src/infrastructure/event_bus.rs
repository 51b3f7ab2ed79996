// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-memory pub/sub for manager-side domain events, backing the presentation
//! layer's SSE stream. Events are not persisted here — the Event Log
//! (`EventRepository`) is the durable record; this bus only fans a copy out
//! to live subscribers.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

use crate::domain::agent::AgentId;
use crate::domain::event::Event;
use crate::domain::policy::PolicyId;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[allow(clippy::large_enum_variant)]
pub enum DomainEvent {
    AgentRegistered { agent_id: AgentId },
    AgentHeartbeat { agent_id: AgentId },
    AgentUnregistered { agent_id: AgentId },
    PolicyChanged { policy_id: PolicyId },
    EventIngested { event: Box<Event> },
}

#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DomainEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender: Arc::new(sender) }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1024)
    }

    pub fn publish(&self, event: DomainEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver { receiver: self.sender.subscribe() }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!(lagged = n, "event bus receiver lagged, events dropped");
                EventBusError::Lagged(n)
            }
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("event bus is closed")]
    Closed,
    #[error("receiver lagged by {0} events")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_subscribe_roundtrip() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let agent_id = AgentId::new();
        bus.publish(DomainEvent::AgentRegistered { agent_id });
        match rx.recv().await.unwrap() {
            DomainEvent::AgentRegistered { agent_id: id } => assert_eq!(id, agent_id),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive() {
        let bus = EventBus::new(8);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
        bus.publish(DomainEvent::PolicyChanged { policy_id: PolicyId::new() });
        rx1.recv().await.unwrap();
        rx2.recv().await.unwrap();
    }
}
