// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! The Agent core (§2 "Endpoint tier", §4.4 Agent Lifecycle): owns the
//! lifecycle state machine and wires the enrollment/heartbeat loop, the
//! policy sync loop, the four monitors, the Enforcer, and the Uploader
//! together. This is the one module every binary entry point (the CLI's
//! `agent` subcommand, or a test harness) drives directly.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use cybersentinel_agent_sdk::{HeartbeatRequest, ManagerClient, RegisterRequest};
use cybersentinel_core::domain::agent::{AgentCapabilities, AgentId, Platform};
use cybersentinel_core::domain::bundle::SyncResponse;
use parking_lot::Mutex as PLMutex;
use tokio_util::sync::CancellationToken;

use crate::application::config::{hostname_or_unknown, EndpointConfig};
use crate::application::dedup::DedupMap;
use crate::application::enforcer::Enforcer;
use crate::application::monitors::{
    ClipboardMonitor, ClipboardReader, FilesystemMonitor, ForegroundWindowReader, NullClipboardReader,
    NullForegroundWindowReader, NullRemovableDriveLister, RemovableDriveLister, UsbDeviceMonitor, UsbFileTransferMonitor,
};
use crate::application::uploader::{Uploader, UploaderHandle};
use crate::domain::usb_state::{NullUsbController, UsbController};
use crate::domain::{Clock, LifecycleState, OriginalContentCache, PolicySnapshot, SuppressionSets, SystemClock, UsbBlockController};

/// The platform-specific hooks the portable core needs: clipboard access,
/// foreground-window attribution, removable-drive enumeration, and the
/// global USB mass-storage controller. No example repo in the pack ships
/// OS-specific FFI to ground real implementations on (see DESIGN.md), so
/// the `null()` constructor supplies the no-op/headless stand-ins the
/// monitors already define; a platform build substitutes real ones.
pub struct PlatformHooks {
    pub usb_controller: Box<dyn UsbController>,
    pub clipboard_reader: Box<dyn ClipboardReader>,
    pub window_reader: Box<dyn ForegroundWindowReader>,
    pub usb_device_lister: Box<dyn RemovableDriveLister>,
    pub usb_transfer_lister: Box<dyn RemovableDriveLister>,
}

impl PlatformHooks {
    pub fn null() -> Self {
        Self {
            usb_controller: Box::new(NullUsbController),
            clipboard_reader: Box::new(NullClipboardReader),
            window_reader: Box::new(NullForegroundWindowReader),
            usb_device_lister: Box::new(NullRemovableDriveLister),
            usb_transfer_lister: Box::new(NullRemovableDriveLister),
        }
    }

    /// Same as [`Self::null`] but with a real clipboard backend, for hosts
    /// that have a display/clipboard to attach to. Falls back to the null
    /// reader if `arboard` can't open one (headless CI, no X server, …).
    pub fn with_system_clipboard() -> Self {
        let clipboard_reader: Box<dyn ClipboardReader> = match crate::application::monitors::ArboardReader::new() {
            Ok(reader) => Box::new(reader),
            Err(e) => {
                tracing::warn!(error = %e, "no clipboard backend available, clipboard monitor will observe nothing");
                Box::new(NullClipboardReader)
            }
        };
        Self { clipboard_reader, ..Self::null() }
    }
}

fn current_platform() -> Platform {
    match std::env::consts::OS {
        "windows" => Platform::Windows,
        "macos" => Platform::Macos,
        _ => Platform::Linux,
    }
}

/// Best-effort local IP discovery: opens a UDP socket toward a public
/// address without sending any traffic, then reads back the OS-assigned
/// local address. No DNS, no packets leave the host.
fn local_ip() -> String {
    std::net::UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "127.0.0.1".to_string())
}

/// The endpoint agent runtime (§2, §4.4). One instance per host process.
pub struct Endpoint {
    config: EndpointConfig,
    config_path: std::path::PathBuf,
    agent_id: AgentId,
    platform: Platform,
    capabilities: AgentCapabilities,
    client: ManagerClient,
    snapshot: Arc<RwLock<Arc<PolicySnapshot>>>,
    content_cache: Arc<OriginalContentCache>,
    suppression: Arc<SuppressionSets>,
    dedup: Arc<DedupMap>,
    enforcer: Arc<Enforcer>,
    usb_controller: Arc<UsbBlockController>,
    clock: Arc<dyn Clock>,
    uploader_handle: UploaderHandle,
    uploader: std::sync::Mutex<Option<Uploader>>,
    hooks: std::sync::Mutex<Option<PlatformHooks>>,
    lifecycle: PLMutex<LifecycleState>,
}

impl Endpoint {
    /// Loads or generates the local config (§6), generating and persisting
    /// `agent_id` on first run (§3 "process-generated on first enrollment
    /// and persisted in local config"), then wires every component.
    pub fn bootstrap(config_path: std::path::PathBuf, hooks: PlatformHooks) -> anyhow::Result<Arc<Self>> {
        let mut config = EndpointConfig::load(&config_path)?;
        let agent_id = match &config.agent_id {
            Some(id) => AgentId::from_string(id).map_err(|e| anyhow::anyhow!("invalid persisted agent_id: {e}"))?,
            None => {
                let id = AgentId::new();
                config.agent_id = Some(id.to_string());
                config.save(&config_path)?;
                id
            }
        };

        let client = ManagerClient::new(config.server_url.clone());
        let (uploader, uploader_handle) = Uploader::new(client.clone());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let content_cache = Arc::new(OriginalContentCache::new(config.content_cache_capacity));
        let suppression = Arc::new(SuppressionSets::default());
        let enforcer = Arc::new(Enforcer::new(
            Arc::clone(&content_cache),
            Arc::clone(&suppression),
            Arc::clone(&clock),
            chrono::Duration::seconds(config.restoration_window_secs),
            chrono::Duration::seconds(config.restored_grace_secs),
        ));

        // The global USB controller is consumed here to build the shared
        // block-state machine; the remaining hooks are kept for monitor
        // startup in `run`.
        let PlatformHooks { usb_controller, clipboard_reader, window_reader, usb_device_lister, usb_transfer_lister } = hooks;
        let usb_block_controller = Arc::new(UsbBlockController::new(usb_controller));
        let remaining_hooks =
            PlatformHooks { usb_controller: Box::new(NullUsbController), clipboard_reader, window_reader, usb_device_lister, usb_transfer_lister };

        Ok(Arc::new(Self {
            platform: current_platform(),
            capabilities: AgentCapabilities { file: true, clipboard: true, usb_device: true, usb_transfer: true },
            config,
            config_path,
            agent_id,
            client,
            snapshot: Arc::new(RwLock::new(Arc::new(PolicySnapshot::default()))),
            content_cache,
            suppression,
            dedup: Arc::new(DedupMap::new()),
            enforcer,
            usb_controller: usb_block_controller,
            clock,
            uploader_handle,
            uploader: std::sync::Mutex::new(Some(uploader)),
            hooks: std::sync::Mutex::new(Some(remaining_hooks)),
            lifecycle: PLMutex::new(LifecycleState::Registering),
        }))
    }

    pub fn agent_id(&self) -> AgentId {
        self.agent_id
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    fn snapshot(&self) -> Arc<PolicySnapshot> {
        Arc::clone(&self.snapshot.read().unwrap())
    }

    /// §4.4 "when `has_usb_device_policies` transitions from blocking to
    /// non-blocking or absent, the enforcer must re-enable any global USB
    /// mass-storage disable it previously applied" — restoration is
    /// unconditional on transition, so this also fires when a transition
    /// brings a previously-blocking bundle down to zero USB policies.
    fn install_snapshot(&self, new: Arc<PolicySnapshot>) {
        let was_blocking = self.snapshot().usb_blocking_active();
        *self.snapshot.write().unwrap() = Arc::clone(&new);
        self.uploader_handle.set_allow_events(new.allow_events());
        if was_blocking && !new.usb_blocking_active() {
            self.usb_controller.unblock();
        }
        tracing::info!(
            version = new.version.as_deref().unwrap_or("none"),
            file = new.file_system.len() + new.file_transfer.len(),
            clipboard = new.clipboard.len(),
            usb_device = new.usb_device.len(),
            usb_transfer = new.usb_file_transfer.len(),
            "installed policy bundle"
        );
    }

    fn register_request(&self) -> RegisterRequest {
        RegisterRequest {
            agent_id: self.agent_id.to_string(),
            name: self.config.agent_name.clone(),
            hostname: hostname_or_unknown(),
            os: self.platform.to_string(),
            os_version: std::env::consts::OS.to_string(),
            ip_address: local_ip(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            capabilities: Some(self.capabilities),
        }
    }

    /// §4.4 "Startup: ... attempt `POST /agents`. On success → Active. On
    /// failure → retry forever with backoff." Returns early if cancelled
    /// mid-retry so shutdown during startup doesn't hang.
    async fn register_with_retry(&self, shutdown: &CancellationToken) {
        let mut backoff = Duration::from_secs(1);
        const MAX_BACKOFF: Duration = Duration::from_secs(60);
        loop {
            let req = self.register_request();
            tokio::select! {
                _ = shutdown.cancelled() => return,
                result = self.client.register(&req) => match result {
                    Ok(_) => {
                        tracing::info!(agent_id = %self.agent_id, "enrolled with manager");
                        *self.lifecycle.lock() = LifecycleState::Active;
                        return;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, backoff_secs = backoff.as_secs(), "enrollment failed, retrying");
                    }
                },
            }
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    /// §4.4 "heartbeat every `heartbeat_interval`... isolates its failures".
    async fn heartbeat_loop(&self, shutdown: CancellationToken) {
        let interval = Duration::from_secs(self.config.heartbeat_interval_secs.max(1));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(interval) => {
                    let req = HeartbeatRequest {
                        timestamp: self.clock.now(),
                        ip_address: Some(local_ip()),
                        policy_version: self.snapshot().version.clone(),
                    };
                    if let Err(e) = self.client.heartbeat(self.agent_id, &req).await {
                        tracing::warn!(error = %e, "heartbeat failed, will retry next tick");
                    }
                }
            }
        }
    }

    /// §4.4 "policy sync every `policy_sync_interval`"; §4.2/§4.4 "Policy
    /// sync failure: keep the last-known bundle, log warning, continue."
    /// Notifies `first_done` once after the first response of either kind
    /// so the caller can gate monitor startup on "first successful bundle
    /// sync" without the loop itself knowing about monitors.
    async fn policy_sync_loop(&self, shutdown: CancellationToken, first_done: Arc<tokio::sync::Notify>) {
        let interval = Duration::from_secs(self.config.policy_sync_interval_secs.max(1));
        let mut first = true;
        loop {
            if !first {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            first = false;

            let installed_version = self.snapshot().version.clone();
            match self.client.sync_policies(self.agent_id, self.platform, installed_version.as_deref()).await {
                Ok(SyncResponse::UpToDate) => {
                    first_done.notify_waiters();
                }
                Ok(SyncResponse::Bundle(bundle)) => {
                    let snapshot = Arc::new(PolicySnapshot::from_bundle(&bundle));
                    self.install_snapshot(snapshot);
                    first_done.notify_waiters();
                }
                Err(e) => {
                    tracing::warn!(error = %e, "policy sync failed, keeping last-known bundle");
                }
            }

            if shutdown.is_cancelled() {
                return;
            }
        }
    }

    /// Runs the endpoint until `shutdown` fires: enrolls, waits for the
    /// first policy bundle (monitors "remain inert" until then, §4.4), then
    /// runs every monitor, the Enforcer's background restorations, and the
    /// Uploader concurrently. On shutdown: unregisters best-effort, stops
    /// monitors, and unconditionally restores USB global state (§4.4
    /// Shutdown).
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let hooks = self.hooks.lock().unwrap().take().unwrap_or_else(PlatformHooks::null);

        self.register_with_retry(&shutdown).await;
        if shutdown.is_cancelled() {
            return;
        }

        let mut tasks = tokio::task::JoinSet::new();

        if let Some(uploader) = self.uploader.lock().unwrap().take() {
            let uploader_shutdown = shutdown.clone();
            tasks.spawn(async move { uploader.run(uploader_shutdown).await });
        }

        {
            let ep = Arc::clone(&self);
            let sd = shutdown.clone();
            tasks.spawn(async move { ep.heartbeat_loop(sd).await });
        }

        let first_sync_done = Arc::new(tokio::sync::Notify::new());
        {
            let ep = Arc::clone(&self);
            let sd = shutdown.clone();
            let notify = Arc::clone(&first_sync_done);
            tasks.spawn(async move { ep.policy_sync_loop(sd, notify).await });
        }

        *self.lifecycle.lock() = LifecycleState::SyncingPolicies;

        tokio::select! {
            _ = first_sync_done.notified() => {}
            _ = shutdown.cancelled() => {}
        }

        if !shutdown.is_cancelled() {
            *self.lifecycle.lock() = LifecycleState::Monitoring;
            self.spawn_monitors(hooks, &mut tasks, &shutdown);
        }

        // Wait for every spawned task to observe the cancellation and
        // finish its current iteration (§5 "loops finish their current
        // iteration, then exit").
        while tasks.join_next().await.is_some() {}

        *self.lifecycle.lock() = LifecycleState::Stopping;
        let _ = self.client.unregister(self.agent_id).await;
        // §4.4 Safety / §4.7: unconditional restoration, regardless of why
        // the process is stopping.
        self.usb_controller.unblock();
        *self.lifecycle.lock() = LifecycleState::Stopped;
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        *self.lifecycle.lock()
    }

    fn spawn_monitors(self: &Arc<Self>, hooks: PlatformHooks, tasks: &mut tokio::task::JoinSet<()>, shutdown: &CancellationToken) {
        let filesystem = Arc::new(FilesystemMonitor::new(
            self.agent_id,
            Arc::clone(&self.snapshot),
            Arc::clone(&self.content_cache),
            Arc::clone(&self.suppression),
            Arc::clone(&self.dedup),
            Arc::clone(&self.enforcer),
            self.uploader_handle.clone(),
            Arc::clone(&self.clock),
            self.config.max_file_size_bytes(),
            chrono::Duration::seconds(self.config.dedup_window_secs),
        ));
        {
            let fs = Arc::clone(&filesystem);
            tasks.spawn(async move {
                fs.baseline().await;
            });
        }
        {
            let fs = filesystem;
            let sd = shutdown.clone();
            tasks.spawn(async move { fs.run(sd).await });
        }

        let clipboard = Arc::new(ClipboardMonitor::new(
            self.agent_id,
            Arc::clone(&self.snapshot),
            self.uploader_handle.clone(),
            hooks.clipboard_reader,
            hooks.window_reader,
        ));
        {
            let sd = shutdown.clone();
            tasks.spawn(async move { clipboard.run(sd).await });
        }

        let usb_device = Arc::new(UsbDeviceMonitor::new(
            self.agent_id,
            Arc::clone(&self.snapshot),
            self.uploader_handle.clone(),
            hooks.usb_device_lister,
            Arc::clone(&self.usb_controller),
        ));
        {
            let sd = shutdown.clone();
            tasks.spawn(async move { usb_device.run(sd).await });
        }

        let usb_transfer = Arc::new(UsbFileTransferMonitor::new(
            self.agent_id,
            Arc::clone(&self.snapshot),
            self.uploader_handle.clone(),
            hooks.usb_transfer_lister,
            chrono::Duration::seconds(self.config.usb_transfer_restore_window_secs),
        ));
        {
            let sd = shutdown.clone();
            tasks.spawn(async move { usb_transfer.run(sd).await });
        }
    }
}
