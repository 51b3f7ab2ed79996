// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Pure/local domain types for the endpoint runtime: policy snapshot,
//! quarantine state, USB block state machine, lifecycle states, and the
//! injectable clock. No network I/O lives here.

pub mod clock;
pub mod lifecycle;
pub mod policy_snapshot;
pub mod quarantine;
pub mod usb_state;

pub use clock::{Clock, FakeClock, SystemClock};
pub use lifecycle::LifecycleState;
pub use policy_snapshot::PolicySnapshot;
pub use quarantine::{OriginalContentCache, QuarantineEntry, SuppressionSets};
pub use usb_state::{BlockOutcome, NullUsbController, UsbBlockController, UsbBlockState, UsbController};
