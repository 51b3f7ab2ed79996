// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! [`ManagerClient`] — register/heartbeat/unregister/policy-sync/event
//! submission against the manager's `/api/v1` surface (§6, §0 "thin typed
//! HTTP client").

use std::time::Duration;

use anyhow::{anyhow, Result};
use cybersentinel_core::domain::agent::{Agent, AgentId, Platform};
use cybersentinel_core::domain::bundle::{PolicyBundle, SyncResponse};
use cybersentinel_core::domain::event::Event;
use reqwest::{Client, StatusCode};

use crate::types::{EventAck, HeartbeatRequest, PolicySyncRequest, RegisterRequest};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Caller-observable outcome of one event submission attempt (§4.10): the
/// uploader decides whether to retry, requeue, or drop based on this.
#[derive(Debug)]
pub enum SubmitOutcome {
    Accepted,
    /// 4xx: the event is malformed or rejected; the uploader drops it after
    /// logging, it never retries (§4.10 "4xx are dropped after logging").
    Rejected(StatusCode),
}

/// Thin, typed client for the endpoint ↔ manager wire protocol. Holds no
/// mutable state beyond the underlying `reqwest::Client` connection pool —
/// all retry/backoff bookkeeping lives in the call that needs it
/// (`submit_event`): `base_url` plus a bare `reqwest::Client`, no session
/// state.
#[derive(Clone)]
pub struct ManagerClient {
    base_url: String,
    http: Client,
}

impl ManagerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = Client::builder().timeout(DEFAULT_TIMEOUT).build().expect("reqwest client builds");
        Self { base_url: base_url.into(), http }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url.trim_end_matches('/'), path)
    }

    /// `POST /agents` (§4.4 startup: "attempt `POST /agents`. On success →
    /// Active. On failure → retry forever with backoff" — the infinite retry
    /// loop itself lives in the endpoint's lifecycle task, not here).
    pub async fn register(&self, req: &RegisterRequest) -> Result<Agent> {
        let resp = self.http.post(self.url("/agents")).json(req).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("register failed: {}", resp.status()));
        }
        Ok(resp.json().await?)
    }

    /// `PUT /agents/{agent_id}/heartbeat`.
    pub async fn heartbeat(&self, agent_id: AgentId, req: &HeartbeatRequest) -> Result<()> {
        let resp = self.http.put(self.url(&format!("/agents/{agent_id}/heartbeat"))).json(req).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("heartbeat failed: {}", resp.status()));
        }
        Ok(())
    }

    /// `DELETE /agents/{agent_id}/unregister` — best-effort on shutdown
    /// (§4.4), so the caller typically ignores the error.
    pub async fn unregister(&self, agent_id: AgentId) -> Result<()> {
        let resp = self.http.delete(self.url(&format!("/agents/{agent_id}/unregister"))).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("unregister failed: {}", resp.status()));
        }
        Ok(())
    }

    /// `POST /agents/{agent_id}/policies/sync` (§4.2 step 3, Testable
    /// Property 2). The wire body is either the bare `{"status":
    /// "up_to_date"}` marker or a bundle payload with no `status` field at
    /// all (§6 "Bundle payload shape") — not a single internally-tagged
    /// shape — so the tag is probed manually rather than deserialized
    /// straight into [`SyncResponse`].
    pub async fn sync_policies(
        &self,
        agent_id: AgentId,
        platform: Platform,
        installed_version: Option<&str>,
    ) -> Result<SyncResponse> {
        let req = PolicySyncRequest { platform: platform.to_string(), installed_version: installed_version.map(String::from) };
        let resp = self.http.post(self.url(&format!("/agents/{agent_id}/policies/sync"))).json(&req).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("policy sync failed: {}", resp.status()));
        }
        let body: serde_json::Value = resp.json().await?;
        if body.get("status").and_then(|v| v.as_str()) == Some("up_to_date") {
            return Ok(SyncResponse::UpToDate);
        }
        let bundle: PolicyBundle = serde_json::from_value(body)?;
        Ok(SyncResponse::Bundle(bundle))
    }

    /// Single `POST /events` attempt with no retry. Used by
    /// [`Self::submit_event_with_retry`] and directly by tests.
    pub async fn submit_event(&self, event: &Event, content: Option<&str>) -> Result<SubmitOutcome> {
        let mut body = serde_json::to_value(event)?;
        if let (Some(content), Some(map)) = (content, body.as_object_mut()) {
            map.insert("content".to_string(), serde_json::Value::String(content.to_string()));
        }
        let resp = self.http.post(self.url("/events")).json(&body).send().await?;
        let status = resp.status();
        if status.is_success() {
            let _: EventAck = resp.json().await.unwrap_or(EventAck { event_id: event.event_id });
            return Ok(SubmitOutcome::Accepted);
        }
        if status.is_client_error() {
            return Ok(SubmitOutcome::Rejected(status));
        }
        Err(anyhow!("event submission failed: {status}"))
    }

    /// Retries transient errors (network, 5xx, `Busy`/503) with capped
    /// exponential backoff; 4xx are dropped after logging (§4.10). Returns
    /// `Ok(true)` if accepted, `Ok(false)` if dropped after a 4xx, `Err` only
    /// once `max_attempts` transient failures have been exhausted.
    pub async fn submit_event_with_retry(&self, event: &Event, content: Option<&str>, max_attempts: u32) -> Result<bool> {
        let mut attempt = 0u32;
        let mut backoff = Duration::from_millis(500);
        const MAX_BACKOFF: Duration = Duration::from_secs(30);

        loop {
            attempt += 1;
            match self.submit_event(event, content).await {
                Ok(SubmitOutcome::Accepted) => return Ok(true),
                Ok(SubmitOutcome::Rejected(status)) => {
                    tracing::warn!(event_id = %event.event_id, %status, "event rejected by manager, dropping");
                    return Ok(false);
                }
                Err(e) if attempt < max_attempts => {
                    tracing::debug!(event_id = %event.event_id, attempt, error = %e, "transient event submission failure, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cybersentinel_core::domain::agent::AgentCapabilities;
    use cybersentinel_core::domain::event::{DetectedContentSummary, EventAction, EventSubtype, EventType, SourceType};
    use cybersentinel_core::domain::policy::Severity;

    fn sample_agent(id: AgentId) -> Agent {
        Agent {
            id,
            name: "workstation-7".to_string(),
            hostname: "ws7".to_string(),
            os_family: "linux".to_string(),
            os_version: "6.8".to_string(),
            agent_version: "0.15.0".to_string(),
            last_ip: "10.0.0.7".to_string(),
            capabilities: AgentCapabilities { file: true, clipboard: true, usb_device: false, usb_transfer: false },
            first_seen: chrono::Utc::now(),
            last_seen: chrono::Utc::now(),
            installed_policy_version: None,
            active: true,
        }
    }

    fn sample_event() -> Event {
        Event {
            event_id: uuid::Uuid::new_v4(),
            agent_id: AgentId::new(),
            source_type: SourceType::Agent,
            event_type: EventType::File,
            event_subtype: EventSubtype::FileModified,
            severity: Severity::Critical,
            action: EventAction::Quarantined,
            file_path: Some("/tmp/watch/x.txt".to_string()),
            file_name: Some("x.txt".to_string()),
            file_size: Some(5),
            file_hash: None,
            detected_content: DetectedContentSummary::default(),
            data_types: vec!["ssn".to_string()],
            matched_policies: vec![],
            total_matches: 1,
            device_name: None,
            device_id: None,
            vendor_id: None,
            product_id: None,
            description: None,
            user_email: None,
            timestamp: chrono::Utc::now(),
            reevaluation: None,
        }
    }

    #[tokio::test]
    async fn register_returns_stored_record_on_2xx() {
        let mut server = mockito::Server::new_async().await;
        let agent_id = AgentId::new();
        let body = serde_json::to_string(&sample_agent(agent_id)).unwrap();
        let mock = server.mock("POST", "/api/v1/agents").with_status(200).with_body(body).create_async().await;

        let client = ManagerClient::new(server.url());
        let req = RegisterRequest {
            agent_id: agent_id.to_string(),
            name: "workstation-7".to_string(),
            hostname: "ws7".to_string(),
            os: "linux".to_string(),
            os_version: "6.8".to_string(),
            ip_address: "10.0.0.7".to_string(),
            version: "0.15.0".to_string(),
            capabilities: None,
        };
        let agent = client.register(&req).await.unwrap();
        assert_eq!(agent.id, agent_id);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn register_errors_on_5xx() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/api/v1/agents").with_status(500).create_async().await;

        let client = ManagerClient::new(server.url());
        let req = RegisterRequest {
            agent_id: AgentId::new().to_string(),
            name: "x".to_string(),
            hostname: "x".to_string(),
            os: "linux".to_string(),
            os_version: "1".to_string(),
            ip_address: "127.0.0.1".to_string(),
            version: "0.15.0".to_string(),
            capabilities: None,
        };
        assert!(client.register(&req).await.is_err());
    }

    #[tokio::test]
    async fn sync_policies_parses_up_to_date_marker() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", mockito::Matcher::Regex(r"^/api/v1/agents/.*/policies/sync$".to_string()))
            .with_status(200)
            .with_body(r#"{"status":"up_to_date"}"#)
            .create_async()
            .await;

        let client = ManagerClient::new(server.url());
        let result = client.sync_policies(AgentId::new(), Platform::Linux, Some("abc123")).await.unwrap();
        assert!(matches!(result, SyncResponse::UpToDate));
    }

    #[tokio::test]
    async fn submit_event_accepted_on_2xx() {
        let mut server = mockito::Server::new_async().await;
        let event = sample_event();
        server
            .mock("POST", "/api/v1/events")
            .with_status(201)
            .with_body(format!(r#"{{"event_id":"{}"}}"#, event.event_id))
            .create_async()
            .await;

        let client = ManagerClient::new(server.url());
        let outcome = client.submit_event(&event, None).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Accepted));
    }

    #[tokio::test]
    async fn submit_event_rejected_on_4xx_is_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        let event = sample_event();
        server.mock("POST", "/api/v1/events").with_status(400).create_async().await;

        let client = ManagerClient::new(server.url());
        let outcome = client.submit_event(&event, None).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Rejected(status) if status.as_u16() == 400));
    }

    #[tokio::test]
    async fn submit_event_with_retry_drops_after_4xx_without_retrying() {
        let mut server = mockito::Server::new_async().await;
        let event = sample_event();
        let mock = server.mock("POST", "/api/v1/events").with_status(422).expect(1).create_async().await;

        let client = ManagerClient::new(server.url());
        let accepted = client.submit_event_with_retry(&event, None, 5).await.unwrap();
        assert!(!accepted);
        mock.assert_async().await;
    }
}
