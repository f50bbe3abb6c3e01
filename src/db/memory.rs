// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store for tests and offline development.
//!
//! Backed by `DashMap`s; query operations scan. Behavior mirrors the
//! Firestore implementation so service tests exercise the same contract.

use crate::db::IntegrationStore;
use crate::error::AppError;
use crate::models::{
    ConsentRecord, ConsentSubjectType, DeviceLink, DeviceStatus, PortalConnection,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

/// In-memory implementation of the integration store.
#[derive(Default)]
pub struct MemoryStore {
    device_links: DashMap<Uuid, DeviceLink>,
    portal_connections: DashMap<Uuid, PortalConnection>,
    consents: DashMap<Uuid, ConsentRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IntegrationStore for MemoryStore {
    // ─── Device Links ────────────────────────────────────────────

    async fn upsert_device_link(&self, link: &DeviceLink) -> Result<(), AppError> {
        self.device_links.insert(link.id, link.clone());
        Ok(())
    }

    async fn get_device_link(&self, id: Uuid) -> Result<Option<DeviceLink>, AppError> {
        Ok(self.device_links.get(&id).map(|l| l.value().clone()))
    }

    async fn get_user_device_link(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<DeviceLink>, AppError> {
        Ok(self
            .device_links
            .get(&id)
            .map(|l| l.value().clone())
            .filter(|l| l.user_id == user_id))
    }

    async fn find_device_link_by_vendor(
        &self,
        user_id: Uuid,
        vendor: &str,
    ) -> Result<Option<DeviceLink>, AppError> {
        Ok(self
            .device_links
            .iter()
            .map(|l| l.value().clone())
            .find(|l| {
                l.user_id == user_id && l.vendor == vendor && l.status != DeviceStatus::Revoked
            }))
    }

    async fn list_device_links(&self, user_id: Uuid) -> Result<Vec<DeviceLink>, AppError> {
        Ok(self
            .device_links
            .iter()
            .map(|l| l.value().clone())
            .filter(|l| l.user_id == user_id)
            .collect())
    }

    async fn list_active_device_links(&self) -> Result<Vec<DeviceLink>, AppError> {
        Ok(self
            .device_links
            .iter()
            .map(|l| l.value().clone())
            .filter(|l| l.status == DeviceStatus::Active)
            .collect())
    }

    async fn list_links_needing_sync(
        &self,
        synced_before: DateTime<Utc>,
    ) -> Result<Vec<DeviceLink>, AppError> {
        let links = self.list_active_device_links().await?;
        Ok(links
            .into_iter()
            .filter(|l| match l.last_sync_at {
                None => true,
                Some(last) => last < synced_before,
            })
            .collect())
    }

    async fn list_links_needing_refresh(
        &self,
        expires_before: DateTime<Utc>,
    ) -> Result<Vec<DeviceLink>, AppError> {
        let links = self.list_active_device_links().await?;
        Ok(links
            .into_iter()
            .filter(|l| match l.token_expires_at {
                None => false,
                Some(expires_at) => expires_at < expires_before,
            })
            .collect())
    }

    // ─── Portal Connections ──────────────────────────────────────

    async fn upsert_portal_connection(&self, conn: &PortalConnection) -> Result<(), AppError> {
        self.portal_connections.insert(conn.id, conn.clone());
        Ok(())
    }

    async fn get_user_portal_connection(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<PortalConnection>, AppError> {
        Ok(self
            .portal_connections
            .get(&id)
            .map(|c| c.value().clone())
            .filter(|c| c.user_id == user_id))
    }

    async fn list_portal_connections(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<PortalConnection>, AppError> {
        Ok(self
            .portal_connections
            .iter()
            .map(|c| c.value().clone())
            .filter(|c| c.user_id == user_id)
            .collect())
    }

    // ─── Consent Records ─────────────────────────────────────────

    async fn upsert_consent(&self, consent: &ConsentRecord) -> Result<(), AppError> {
        self.consents.insert(consent.id, consent.clone());
        Ok(())
    }

    async fn get_consent(&self, id: Uuid) -> Result<Option<ConsentRecord>, AppError> {
        Ok(self.consents.get(&id).map(|c| c.value().clone()))
    }

    async fn find_active_consent(
        &self,
        user_id: Uuid,
        subject_type: ConsentSubjectType,
        subject_id: Uuid,
    ) -> Result<Option<ConsentRecord>, AppError> {
        Ok(self
            .consents
            .iter()
            .map(|c| c.value().clone())
            .find(|c| {
                c.user_id == user_id
                    && c.subject_type == subject_type
                    && c.subject_id == subject_id
                    && c.is_active()
            }))
    }

    async fn list_consents(&self, user_id: Uuid) -> Result<Vec<ConsentRecord>, AppError> {
        let mut consents: Vec<ConsentRecord> = self
            .consents
            .iter()
            .map(|c| c.value().clone())
            .filter(|c| c.user_id == user_id)
            .collect();
        consents.sort_by(|a, b| b.consented_at.cmp(&a.consented_at));
        Ok(consents)
    }
}
