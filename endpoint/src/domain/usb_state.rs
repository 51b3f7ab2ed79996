// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Global USB mass-storage block state machine (§4.7): `Unblocked ⇄
//! Blocked`, transitions idempotent, unconditional restoration to
//! `Unblocked` on `Monitoring → Stopping` (§4.4 Safety).

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsbBlockState {
    Unblocked,
    Blocked,
}

/// Result of one block attempt, carrying partial-success detail the
/// enforcer reports on the `usb_blocked` event (§4.7: `block_success`,
/// `registry_blocked`, `devices_disabled`, `drives_ejected`).
#[derive(Debug, Clone, Default)]
pub struct BlockOutcome {
    pub block_success: bool,
    pub registry_blocked: bool,
    pub devices_disabled: u32,
    pub drives_ejected: u32,
}

/// Platform hook for the two-step global block (§4.7 steps 1-3). A host
/// build provides the OS-specific implementation; this trait is the seam
/// (grounded on the general Rust idiom of a platform trait object at the
/// edge of an otherwise-portable core, since no example repo in the pack
/// ships OS-specific USB control code to ground this on directly).
pub trait UsbController: Send + Sync {
    fn set_mass_storage_driver_disabled(&self, disabled: bool) -> bool;
    fn disable_storage_devices(&self) -> u32;
    fn enable_storage_devices(&self) -> u32;
    fn eject_mounted_removable_drives(&self) -> u32;
}

/// No-op controller used where no privileged platform hook is available
/// (tests, unsupported platforms). Reports the two-step sequence as
/// attempted-but-ineffective rather than failing outright, matching §4.7's
/// "partial success is acceptable and must be reflected in the event".
pub struct NullUsbController;

impl UsbController for NullUsbController {
    fn set_mass_storage_driver_disabled(&self, _disabled: bool) -> bool {
        false
    }
    fn disable_storage_devices(&self) -> u32 {
        0
    }
    fn enable_storage_devices(&self) -> u32 {
        0
    }
    fn eject_mounted_removable_drives(&self) -> u32 {
        0
    }
}

/// Tracks current block state and drives the idempotent transitions.
pub struct UsbBlockController {
    blocked: AtomicBool,
    controller: Box<dyn UsbController>,
}

impl UsbBlockController {
    pub fn new(controller: Box<dyn UsbController>) -> Self {
        Self { blocked: AtomicBool::new(false), controller }
    }

    pub fn state(&self) -> UsbBlockState {
        if self.blocked.load(Ordering::SeqCst) {
            UsbBlockState::Blocked
        } else {
            UsbBlockState::Unblocked
        }
    }

    /// Idempotent: calling `block` while already blocked is a no-op success.
    pub fn block(&self) -> BlockOutcome {
        if self.blocked.swap(true, Ordering::SeqCst) {
            return BlockOutcome { block_success: true, registry_blocked: true, devices_disabled: 0, drives_ejected: 0 };
        }
        let registry_blocked = self.controller.set_mass_storage_driver_disabled(true);
        let devices_disabled = self.controller.disable_storage_devices();
        let drives_ejected = self.controller.eject_mounted_removable_drives();
        BlockOutcome { block_success: registry_blocked || devices_disabled > 0, registry_blocked, devices_disabled, drives_ejected }
    }

    /// Unconditional restoration (§4.4 Safety, §4.7 "On `Monitoring →
    /// Stopping`, restore to `Unblocked` unconditionally"). Idempotent.
    pub fn unblock(&self) {
        if self.blocked.swap(false, Ordering::SeqCst) {
            self.controller.set_mass_storage_driver_disabled(false);
            self.controller.enable_storage_devices();
        }
    }
}
