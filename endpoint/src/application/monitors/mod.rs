// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! The four independent concurrent monitors (§2 "Endpoint tier", §5): one
//! Tokio task per monitor, communicating with the Enforcer/Uploader only
//! through the shared policy snapshot and their own local state — no
//! cross-monitor shared mutable state (§4.4 Design Notes, "Callback/thread
//! monitors").

pub mod clipboard;
pub mod filesystem;
pub mod usb_device;
pub mod usb_transfer;

pub use clipboard::{ArboardReader, ClipboardMonitor, ClipboardReader, ForegroundWindowReader, NullClipboardReader, NullForegroundWindowReader};
pub use filesystem::FilesystemMonitor;
pub use usb_device::{NullRemovableDriveLister, RemovableDrive, RemovableDriveLister, UsbDeviceMonitor};
pub use usb_transfer::UsbFileTransferMonitor;
