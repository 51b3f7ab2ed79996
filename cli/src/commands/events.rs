// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `cybersentinel events` — a thin admin client against the manager's
//! `/api/v1/events` endpoints (§6).

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use cybersentinel_core::domain::event::EventType;
use cybersentinel_core::domain::policy::Severity;
use uuid::Uuid;

#[derive(Debug, Subcommand)]
pub enum EventsCommand {
    /// Query the event log
    List {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, value_enum)]
        event_type: Option<EventTypeArg>,
        #[arg(long, value_enum)]
        severity: Option<SeverityArg>,
        #[arg(long)]
        agent_id: Option<Uuid>,
        #[arg(long)]
        q: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum EventTypeArg {
    File,
    Clipboard,
    Usb,
}

impl From<EventTypeArg> for EventType {
    fn from(v: EventTypeArg) -> Self {
        match v {
            EventTypeArg::File => EventType::File,
            EventTypeArg::Clipboard => EventType::Clipboard,
            EventTypeArg::Usb => EventType::Usb,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SeverityArg {
    Low,
    Medium,
    High,
    Critical,
}

impl From<SeverityArg> for Severity {
    fn from(v: SeverityArg) -> Self {
        match v {
            SeverityArg::Low => Severity::Low,
            SeverityArg::Medium => Severity::Medium,
            SeverityArg::High => Severity::High,
            SeverityArg::Critical => Severity::Critical,
        }
    }
}

pub async fn handle_command(command: EventsCommand, server_url: &str) -> Result<()> {
    let client = reqwest::Client::new();
    let base = format!("{server_url}/api/v1/events");

    match command {
        EventsCommand::List { limit, event_type, severity, agent_id, q } => {
            let mut req = client.get(&base);
            if let Some(limit) = limit {
                req = req.query(&[("limit", limit.to_string())]);
            }
            if let Some(event_type) = event_type {
                let wire = match EventType::from(event_type) {
                    EventType::File => "file",
                    EventType::Clipboard => "clipboard",
                    EventType::Usb => "usb",
                };
                req = req.query(&[("event_type", wire)]);
            }
            if let Some(severity) = severity {
                let wire = match Severity::from(severity) {
                    Severity::Low => "low",
                    Severity::Medium => "medium",
                    Severity::High => "high",
                    Severity::Critical => "critical",
                };
                req = req.query(&[("severity", wire)]);
            }
            if let Some(agent_id) = agent_id {
                req = req.query(&[("agent_id", agent_id.to_string())]);
            }
            if let Some(q) = q {
                req = req.query(&[("q", q)]);
            }

            let resp: serde_json::Value = req.send().await?.error_for_status().context("event query failed")?.json().await?;
            print_events(&resp);
        }
    }
    Ok(())
}

fn print_events(resp: &serde_json::Value) {
    let total = resp.get("total").and_then(|v| v.as_u64()).unwrap_or(0);
    let events = resp.get("events").and_then(|v| v.as_array()).cloned().unwrap_or_default();
    if events.is_empty() {
        println!("{}", "no events matched".dimmed());
        return;
    }
    println!("{} of {} events", events.len(), total);
    for event in events {
        let id = event.get("event_id").and_then(|v| v.as_str()).unwrap_or("?");
        let subtype = event.get("event_subtype").and_then(|v| v.as_str()).unwrap_or("?");
        let severity = event.get("severity").and_then(|v| v.as_str()).unwrap_or("?");
        let action = event.get("action").and_then(|v| v.as_str()).unwrap_or("?");
        let path = event.get("file_path").and_then(|v| v.as_str()).unwrap_or("-");
        println!(
            "{}  {:<18} {:<10} action={:<22} {}",
            id.dimmed(),
            subtype,
            severity_colored(severity),
            action,
            path
        );
    }
}

fn severity_colored(severity: &str) -> colored::ColoredString {
    match severity {
        "critical" => severity.red().bold(),
        "high" => severity.red(),
        "medium" => severity.yellow(),
        _ => severity.normal(),
    }
}
