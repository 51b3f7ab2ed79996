// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `cybersentinel policy` — a thin admin client against the manager's
//! `/api/v1/policies` endpoints (§6).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use cybersentinel_core::domain::policy::{Policy, PolicyConfig, PolicyStats, Severity};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Subcommand)]
pub enum PolicyCommand {
    /// List every policy on the manager
    List,
    /// Create a policy from a JSON or YAML file
    Create {
        /// Path to a file describing the policy (see `UpsertPolicyFile`)
        file: PathBuf,
    },
    /// Replace a policy's definition
    Update {
        id: Uuid,
        file: PathBuf,
    },
    /// Enable a policy
    Enable { id: Uuid },
    /// Disable a policy
    Disable { id: Uuid },
    /// Delete a policy
    Delete { id: Uuid },
    /// Show aggregate counts by type and enabled/disabled
    Stats,
}

/// The on-disk shape accepted by `create`/`update`, parsed as JSON or YAML
/// depending on the file extension. Mirrors the manager's
/// `UpsertPolicyRequest` wire body.
#[derive(Debug, Serialize, Deserialize)]
struct UpsertPolicyFile {
    name: String,
    #[serde(default)]
    description: String,
    severity: Severity,
    #[serde(default)]
    priority: i32,
    config: PolicyConfig,
}

fn load_policy_file(path: &PathBuf) -> Result<UpsertPolicyFile> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read {path:?}"))?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&raw).context("failed to parse policy YAML"),
        _ => serde_json::from_str(&raw).context("failed to parse policy JSON"),
    }
}

pub async fn handle_command(command: PolicyCommand, server_url: &str) -> Result<()> {
    let client = reqwest::Client::new();
    let base = format!("{server_url}/api/v1/policies");

    match command {
        PolicyCommand::List => {
            let policies: Vec<Policy> = client.get(&base).send().await?.error_for_status()?.json().await?;
            print_policy_table(&policies);
        }
        PolicyCommand::Create { file } => {
            let body = load_policy_file(&file)?;
            let policy: Policy = client.post(&base).json(&body).send().await?.error_for_status()?.json().await?;
            println!("{} created policy {} ({})", "✓".green(), policy.name.bold(), policy.id);
        }
        PolicyCommand::Update { id, file } => {
            let body = load_policy_file(&file)?;
            let policy: Policy = client.put(format!("{base}/{id}")).json(&body).send().await?.error_for_status()?.json().await?;
            println!("{} updated policy {} ({})", "✓".green(), policy.name.bold(), policy.id);
        }
        PolicyCommand::Enable { id } => {
            client.post(format!("{base}/{id}/enable")).send().await?.error_for_status()?;
            println!("{} enabled policy {id}", "✓".green());
        }
        PolicyCommand::Disable { id } => {
            client.post(format!("{base}/{id}/disable")).send().await?.error_for_status()?;
            println!("{} disabled policy {id}", "✓".green());
        }
        PolicyCommand::Delete { id } => {
            client.delete(format!("{base}/{id}")).send().await?.error_for_status()?;
            println!("{} deleted policy {id}", "✓".green());
        }
        PolicyCommand::Stats => {
            let stats: PolicyStats = client.get(format!("{base}/stats/summary")).send().await?.error_for_status()?.json().await?;
            println!("{}", "policy stats".bold());
            println!("  total:    {}", stats.total);
            println!("  enabled:  {}", stats.enabled);
            println!("  disabled: {}", stats.disabled);
            for (kind, count) in &stats.by_type {
                println!("  {kind}: {count}");
            }
        }
    }
    Ok(())
}

fn print_policy_table(policies: &[Policy]) {
    if policies.is_empty() {
        println!("{}", "no policies configured".dimmed());
        return;
    }
    for policy in policies {
        let state = if policy.enabled { "enabled".green() } else { "disabled".dimmed() };
        println!(
            "{}  {:<28} {:<10} prio={:<4} {}",
            policy.id.to_string().dimmed(),
            policy.name.bold(),
            policy.config.policy_type().wire_key(),
            policy.priority,
            state
        );
    }
}
