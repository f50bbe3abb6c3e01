// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Device link model: one wearable vendor connection per (user, vendor).
//!
//! Lifecycle: PENDING -> ACTIVE -> {EXPIRED, ERROR, REVOKED}. ACTIVE is
//! re-entered from EXPIRED/ERROR by a successful refresh or sync; REVOKED
//! is terminal and irreversibly clears the credential fields.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a device link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceStatus {
    Pending,
    Active,
    Expired,
    Revoked,
    Error,
}

/// Per-link sync configuration.
///
/// Versioned so older stored documents deserialize with defaults instead
/// of failing when fields are added.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "SyncConfig::current_version")]
    pub version: u32,
    /// Requested sync cadence ("hourly", "daily", ...)
    #[serde(default = "SyncConfig::default_frequency")]
    pub frequency: String,
    /// Data types pulled from the vendor on each sync
    #[serde(default = "SyncConfig::default_data_types")]
    pub data_types: Vec<String>,
    /// Maximum datapoints fetched per sync call
    #[serde(default = "SyncConfig::default_batch_size")]
    pub batch_size: u32,
}

impl SyncConfig {
    fn current_version() -> u32 {
        1
    }

    fn default_frequency() -> String {
        "hourly".to_string()
    }

    fn default_data_types() -> Vec<String> {
        vec![
            "steps".to_string(),
            "heart_rate".to_string(),
            "sleep".to_string(),
        ]
    }

    fn default_batch_size() -> u32 {
        1000
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            version: Self::current_version(),
            frequency: Self::default_frequency(),
            data_types: Self::default_data_types(),
            batch_size: Self::default_batch_size(),
        }
    }
}

/// A user's connection to one wearable vendor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceLink {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Vendor identifier ("strava", "mock", ...)
    pub vendor: String,
    /// Kind of device ("watch", "blood_pressure_monitor", ...)
    pub device_type: String,
    /// The vendor's own identifier for this user, if known
    pub vendor_user_id: Option<String>,
    /// Opaque access credential; None once revoked
    pub access_token: Option<String>,
    /// Opaque refresh credential; None once revoked or for vendors without one
    pub refresh_token: Option<String>,
    /// When the access credential expires
    pub token_expires_at: Option<DateTime<Utc>>,
    pub status: DeviceStatus,
    /// Message from the last failed operation
    pub error_message: Option<String>,
    /// Last successful sync; None until the first sync completes
    pub last_sync_at: Option<DateTime<Utc>>,
    pub sync_config: SyncConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeviceLink {
    /// Create a new link in PENDING state (no credential yet).
    pub fn new(user_id: Uuid, vendor: &str, device_type: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            vendor: vendor.to_string(),
            device_type: device_type.to_string(),
            vendor_user_id: None,
            access_token: None,
            refresh_token: None,
            token_expires_at: None,
            status: DeviceStatus::Pending,
            error_message: None,
            last_sync_at: None,
            sync_config: SyncConfig::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Store the initial credential pair and activate the link.
    pub fn set_tokens(
        &mut self,
        access_token: String,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) {
        self.access_token = Some(access_token);
        self.refresh_token = refresh_token;
        self.token_expires_at = Some(expires_at);
        self.status = DeviceStatus::Active;
        self.error_message = None;
        self.touch();
    }

    /// Replace the credential pair after a refresh.
    ///
    /// Vendors that rotate refresh tokens send a new one; vendors that
    /// don't send None, in which case the old refresh token is kept.
    pub fn refresh_tokens(
        &mut self,
        access_token: String,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) {
        self.access_token = Some(access_token);
        if let Some(refresh) = refresh_token {
            self.refresh_token = Some(refresh);
        }
        self.token_expires_at = Some(expires_at);
        self.status = DeviceStatus::Active;
        self.error_message = None;
        self.touch();
    }

    /// Record a successful sync.
    pub fn mark_synced(&mut self, at: DateTime<Utc>) {
        self.last_sync_at = Some(at);
        self.status = DeviceStatus::Active;
        self.error_message = None;
        self.touch();
    }

    /// Record a failed operation.
    pub fn mark_error(&mut self, message: &str) {
        self.status = DeviceStatus::Error;
        self.error_message = Some(message.to_string());
        self.touch();
    }

    /// Flag the credential as expired.
    pub fn mark_expired(&mut self) {
        self.status = DeviceStatus::Expired;
        self.touch();
    }

    /// Sever the link. Terminal: clears both credentials.
    pub fn revoke(&mut self) {
        self.status = DeviceStatus::Revoked;
        self.access_token = None;
        self.refresh_token = None;
        self.touch();
    }

    /// Whether the access credential is past its expiry.
    pub fn is_token_expired(&self, now: DateTime<Utc>) -> bool {
        match self.token_expires_at {
            Some(expires_at) => now > expires_at,
            None => true,
        }
    }

    /// Whether the credential expires within the lookahead window.
    pub fn needs_token_refresh(&self, now: DateTime<Utc>, lookahead: Duration) -> bool {
        match self.token_expires_at {
            Some(expires_at) => now + lookahead > expires_at,
            None => true,
        }
    }

    /// Whether the link is eligible for a data sync.
    pub fn can_sync(&self, now: DateTime<Utc>) -> bool {
        self.status == DeviceStatus::Active && !self.is_token_expired(now)
    }

    pub fn set_vendor_user_id(&mut self, vendor_user_id: String) {
        self.vendor_user_id = Some(vendor_user_id);
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
