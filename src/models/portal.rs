// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Portal connection model: one hospital/insurance portal per (user, type).
//!
//! Unlike device links there is no refresh credential: authentication is
//! single-shot, and a failed attempt is terminal for that row. UNSUPPORTED
//! (portal type not integrable here) is distinct from FAILED (integrable
//! but this authentication attempt was rejected).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a portal connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PortalStatus {
    Pending,
    Active,
    Failed,
    Unsupported,
    Revoked,
}

/// A user's connection to one health portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConnection {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Portal type identifier ("NHIS", ...)
    pub portal_type: String,
    /// Caller-supplied portal/site identifier
    pub portal_id: Option<String>,
    /// Human-readable name reported by the portal
    pub portal_name: Option<String>,
    /// The portal's own identifier for this user
    pub portal_user_id: Option<String>,
    /// Opaque session token; None until authenticated and once revoked
    pub credentials: Option<String>,
    pub status: PortalStatus,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PortalConnection {
    /// Create a new connection attempt in PENDING state.
    pub fn new(user_id: Uuid, portal_type: &str, portal_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            portal_type: portal_type.to_string(),
            portal_id,
            portal_name: None,
            portal_user_id: None,
            credentials: None,
            status: PortalStatus::Pending,
            error_code: None,
            error_message: None,
            last_sync_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Activate after successful authentication.
    pub fn mark_active(&mut self) {
        self.status = PortalStatus::Active;
        self.error_code = None;
        self.error_message = None;
        self.touch();
    }

    /// Record a failed authentication or sync.
    pub fn mark_failed(&mut self, error_code: &str, error_message: &str) {
        self.status = PortalStatus::Failed;
        self.error_code = Some(error_code.to_string());
        self.error_message = Some(error_message.to_string());
        self.touch();
    }

    /// Flag the portal type as not integrable in this deployment.
    pub fn mark_unsupported(&mut self) {
        self.status = PortalStatus::Unsupported;
        self.touch();
    }

    /// Record a successful sync.
    pub fn mark_synced(&mut self, at: DateTime<Utc>) {
        self.last_sync_at = Some(at);
        self.status = PortalStatus::Active;
        self.touch();
    }

    /// Sever the connection. Terminal: clears the credential.
    pub fn revoke(&mut self) {
        self.status = PortalStatus::Revoked;
        self.credentials = None;
        self.touch();
    }

    pub fn set_portal_name(&mut self, portal_name: String) {
        self.portal_name = Some(portal_name);
        self.touch();
    }

    pub fn set_portal_user_id(&mut self, portal_user_id: String) {
        self.portal_user_id = Some(portal_user_id);
        self.touch();
    }

    pub fn set_credentials(&mut self, credentials: String) {
        self.credentials = Some(credentials);
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
