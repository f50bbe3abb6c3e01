// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Consent ledger records.
//!
//! A consent is a grant permitting data collection or sharing for one
//! subject, keyed by (user, subject type, subject id). Revocation is
//! one-way: a revoked consent is never reactivated, a new grant mints a
//! fresh record instead.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Current version stamped onto new consent records.
const CONSENT_VERSION: &str = "1.0";

/// What the consent covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsentSubjectType {
    Device,
    Portal,
    FamilyBoard,
    DataProcessing,
}

/// The kind of permission granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsentType {
    DataCollection,
    DataSharing,
    Marketing,
}

/// Consent lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsentStatus {
    Active,
    Revoked,
    Expired,
}

/// Structured consent scope.
///
/// Versioned record instead of a loose JSON map so stored scopes stay
/// forward-compatible when fields are added.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentScope {
    #[serde(default = "ConsentScope::current_version")]
    pub version: u32,
    /// Data categories the grant covers
    #[serde(default)]
    pub data_types: Vec<String>,
    /// Permitted sync cadence ("hourly", "monthly", ...)
    #[serde(default)]
    pub frequency: String,
    /// How long collected data may be retained ("5years", ...)
    #[serde(default)]
    pub retention_period: Option<String>,
    /// Per-audience sharing flags ("family" -> true, ...)
    #[serde(default)]
    pub sharing_allowed: Option<HashMap<String, bool>>,
}

impl ConsentScope {
    fn current_version() -> u32 {
        1
    }
}

impl Default for ConsentScope {
    fn default() -> Self {
        Self {
            version: Self::current_version(),
            data_types: Vec::new(),
            frequency: String::new(),
            retention_period: None,
            sharing_allowed: None,
        }
    }
}

/// One grant in the consent ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subject_type: ConsentSubjectType,
    pub subject_id: Uuid,
    pub consent_type: ConsentType,
    pub scope: ConsentScope,
    pub status: ConsentStatus,
    pub consent_version: String,
    pub consented_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoke_reason: Option<String>,
}

impl ConsentRecord {
    fn new(
        user_id: Uuid,
        subject_type: ConsentSubjectType,
        subject_id: Uuid,
        consent_type: ConsentType,
        scope: ConsentScope,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            subject_type,
            subject_id,
            consent_type,
            scope,
            status: ConsentStatus::Active,
            consent_version: CONSENT_VERSION.to_string(),
            consented_at: Utc::now(),
            revoked_at: None,
            revoke_reason: None,
        }
    }

    /// Grant data collection for a device link.
    pub fn grant_device_consent(user_id: Uuid, device_id: Uuid, scope: ConsentScope) -> Self {
        Self::new(
            user_id,
            ConsentSubjectType::Device,
            device_id,
            ConsentType::DataCollection,
            scope,
        )
    }

    /// Grant data collection for a portal connection.
    pub fn grant_portal_consent(user_id: Uuid, portal_id: Uuid, scope: ConsentScope) -> Self {
        Self::new(
            user_id,
            ConsentSubjectType::Portal,
            portal_id,
            ConsentType::DataCollection,
            scope,
        )
    }

    /// Grant data sharing for a family board.
    pub fn grant_family_board_consent(user_id: Uuid, board_id: Uuid, scope: ConsentScope) -> Self {
        Self::new(
            user_id,
            ConsentSubjectType::FamilyBoard,
            board_id,
            ConsentType::DataSharing,
            scope,
        )
    }

    /// Revoke the grant. One-way; only an ACTIVE consent can be revoked.
    pub fn revoke(&mut self, reason: &str) -> Result<(), AppError> {
        if self.status != ConsentStatus::Active {
            return Err(AppError::InvalidState(
                "only an active consent can be revoked".to_string(),
            ));
        }
        self.status = ConsentStatus::Revoked;
        self.revoked_at = Some(Utc::now());
        self.revoke_reason = Some(reason.to_string());
        Ok(())
    }

    /// Expire the grant (retention period elapsed). No-op unless ACTIVE.
    pub fn expire(&mut self) {
        if self.status == ConsentStatus::Active {
            self.status = ConsentStatus::Expired;
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ConsentStatus::Active
    }

    /// Whether the scope permits collecting the given data type.
    pub fn allows_data_type(&self, data_type: &str) -> bool {
        self.scope.data_types.iter().any(|t| t == data_type)
    }
}
