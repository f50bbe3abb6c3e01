// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the integration engine.

pub mod consent;
pub mod device;
pub mod portal;

pub use consent::{ConsentRecord, ConsentScope, ConsentStatus, ConsentSubjectType, ConsentType};
pub use device::{DeviceLink, DeviceStatus, SyncConfig};
pub use portal::{PortalConnection, PortalStatus};
