// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod consent;
pub mod device;
pub mod portal;
pub mod sink;

pub use consent::{ConsentEntry, ConsentService};
pub use device::{DeviceLinkService, LinkedDevice};
pub use portal::PortalConnectionService;
pub use sink::{HealthDataSink, NullSink};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of one sync operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Success,
    Failed,
}

/// Result of syncing one link or connection.
///
/// A failed sync is a value, not an error: callers (and the scheduler)
/// must be able to treat it as one item's outcome inside a batch.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub records_synced: usize,
    pub synced_at: DateTime<Utc>,
    pub status: SyncStatus,
    pub errors: Vec<String>,
}

impl SyncResult {
    pub fn success(records_synced: usize, synced_at: DateTime<Utc>) -> Self {
        Self {
            records_synced,
            synced_at,
            status: SyncStatus::Success,
            errors: Vec::new(),
        }
    }

    pub fn failure(error: String, at: DateTime<Utc>) -> Self {
        Self {
            records_synced: 0,
            synced_at: at,
            status: SyncStatus::Failed,
            errors: vec![error],
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SyncStatus::Success
    }
}
