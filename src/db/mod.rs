// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage layer for links, connections and consents.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{ConsentRecord, ConsentSubjectType, DeviceLink, PortalConnection};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Collection names as constants.
pub mod collections {
    pub const DEVICE_LINKS: &str = "device_links";
    pub const PORTAL_CONNECTIONS: &str = "portal_connections";
    pub const CONSENT_RECORDS: &str = "consent_records";
}

/// Persistence operations the integration engine needs.
///
/// Links and connections are upserted, never deleted: revocation is a
/// terminal status, not a removal.
#[async_trait]
pub trait IntegrationStore: Send + Sync {
    // ─── Device Links ────────────────────────────────────────────

    async fn upsert_device_link(&self, link: &DeviceLink) -> Result<(), AppError>;

    async fn get_device_link(&self, id: Uuid) -> Result<Option<DeviceLink>, AppError>;

    /// Fetch a link only if it belongs to the given user.
    async fn get_user_device_link(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<DeviceLink>, AppError>;

    /// The user's non-revoked link for a vendor, if any.
    async fn find_device_link_by_vendor(
        &self,
        user_id: Uuid,
        vendor: &str,
    ) -> Result<Option<DeviceLink>, AppError>;

    async fn list_device_links(&self, user_id: Uuid) -> Result<Vec<DeviceLink>, AppError>;

    /// All ACTIVE links across users.
    async fn list_active_device_links(&self) -> Result<Vec<DeviceLink>, AppError>;

    /// ACTIVE links never synced or last synced before the threshold.
    async fn list_links_needing_sync(
        &self,
        synced_before: DateTime<Utc>,
    ) -> Result<Vec<DeviceLink>, AppError>;

    /// ACTIVE links whose credential expires before the threshold.
    async fn list_links_needing_refresh(
        &self,
        expires_before: DateTime<Utc>,
    ) -> Result<Vec<DeviceLink>, AppError>;

    // ─── Portal Connections ──────────────────────────────────────

    async fn upsert_portal_connection(&self, conn: &PortalConnection) -> Result<(), AppError>;

    async fn get_user_portal_connection(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<PortalConnection>, AppError>;

    async fn list_portal_connections(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<PortalConnection>, AppError>;

    // ─── Consent Records ─────────────────────────────────────────

    async fn upsert_consent(&self, consent: &ConsentRecord) -> Result<(), AppError>;

    async fn get_consent(&self, id: Uuid) -> Result<Option<ConsentRecord>, AppError>;

    /// The ACTIVE consent for an exact (user, subject type, subject id)
    /// triple, if any.
    async fn find_active_consent(
        &self,
        user_id: Uuid,
        subject_type: ConsentSubjectType,
        subject_id: Uuid,
    ) -> Result<Option<ConsentRecord>, AppError>;

    /// All of a user's consents, newest grant first.
    async fn list_consents(&self, user_id: Uuid) -> Result<Vec<ConsentRecord>, AppError>;
}
