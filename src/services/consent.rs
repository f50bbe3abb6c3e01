// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Consent ledger service.
//!
//! Independent of the provider layer: records, queries and revokes
//! grants keyed by (user, subject type, subject id). Revoking a device
//! or portal consent also severs the linked entity, so a retroactively
//! withdrawn consent cannot leave a live credential behind.

use crate::db::IntegrationStore;
use crate::error::AppError;
use crate::models::{ConsentRecord, ConsentScope, ConsentSubjectType};
use std::sync::Arc;
use uuid::Uuid;

/// A consent with its resolved human-readable subject name.
#[derive(Debug, Clone)]
pub struct ConsentEntry {
    pub record: ConsentRecord,
    pub subject_name: String,
}

/// Service managing the consent ledger.
#[derive(Clone)]
pub struct ConsentService {
    store: Arc<dyn IntegrationStore>,
}

impl ConsentService {
    pub fn new(store: Arc<dyn IntegrationStore>) -> Self {
        Self { store }
    }

    /// Record a new grant.
    ///
    /// At most one ACTIVE consent may exist per (user, subject type,
    /// subject id): an existing active grant for the triple is revoked as
    /// superseded before the new one is written.
    pub async fn grant(
        &self,
        user_id: Uuid,
        subject_type: ConsentSubjectType,
        subject_id: Uuid,
        scope: ConsentScope,
    ) -> Result<ConsentRecord, AppError> {
        if let Some(mut existing) = self
            .store
            .find_active_consent(user_id, subject_type, subject_id)
            .await?
        {
            existing.revoke("superseded by new grant")?;
            self.store.upsert_consent(&existing).await?;
            tracing::info!(
                consent_id = %existing.id,
                "Superseded previous active consent"
            );
        }

        let consent = match subject_type {
            ConsentSubjectType::Device => {
                ConsentRecord::grant_device_consent(user_id, subject_id, scope)
            }
            ConsentSubjectType::Portal => {
                ConsentRecord::grant_portal_consent(user_id, subject_id, scope)
            }
            ConsentSubjectType::FamilyBoard => {
                ConsentRecord::grant_family_board_consent(user_id, subject_id, scope)
            }
            ConsentSubjectType::DataProcessing => {
                return Err(AppError::NotSupported(
                    "data processing consent is not granted through this API".to_string(),
                ))
            }
        };

        self.store.upsert_consent(&consent).await?;

        tracing::info!(
            consent_id = %consent.id,
            user_id = %user_id,
            subject_type = ?subject_type,
            "Consent granted"
        );

        Ok(consent)
    }

    /// Revoke a grant and sever the linked entity.
    ///
    /// Fails with InvalidState when the consent is not ACTIVE; a revoked
    /// consent is never reactivated.
    pub async fn revoke(&self, user_id: Uuid, consent_id: Uuid, reason: &str) -> Result<(), AppError> {
        let mut consent = self
            .store
            .get_consent(consent_id)
            .await?
            .filter(|c| c.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("consent {}", consent_id)))?;

        consent.revoke(reason)?;
        self.store.upsert_consent(&consent).await?;

        // Withdrawn consent severs the linked entity as well
        match consent.subject_type {
            ConsentSubjectType::Device => {
                if let Some(mut link) = self.store.get_device_link(consent.subject_id).await? {
                    link.revoke();
                    self.store.upsert_device_link(&link).await?;
                    tracing::info!(link_id = %link.id, "Device link revoked with consent");
                }
            }
            ConsentSubjectType::Portal => {
                if let Some(mut conn) = self
                    .store
                    .get_user_portal_connection(user_id, consent.subject_id)
                    .await?
                {
                    conn.revoke();
                    self.store.upsert_portal_connection(&conn).await?;
                    tracing::info!(connection_id = %conn.id, "Portal connection revoked with consent");
                }
            }
            ConsentSubjectType::FamilyBoard | ConsentSubjectType::DataProcessing => {}
        }

        tracing::info!(consent_id = %consent_id, reason = %reason, "Consent revoked");
        Ok(())
    }

    /// Whether an ACTIVE consent exists for the exact triple.
    pub async fn has_active_consent(
        &self,
        user_id: Uuid,
        subject_type: ConsentSubjectType,
        subject_id: Uuid,
    ) -> Result<bool, AppError> {
        Ok(self
            .store
            .find_active_consent(user_id, subject_type, subject_id)
            .await?
            .is_some())
    }

    /// All of a user's consents, newest first, with subject names.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<ConsentEntry>, AppError> {
        let consents = self.store.list_consents(user_id).await?;

        let mut entries = Vec::with_capacity(consents.len());
        for record in consents {
            entries.push(self.describe(record).await?);
        }
        Ok(entries)
    }

    /// Resolve a record's human-readable subject name.
    pub async fn describe(&self, record: ConsentRecord) -> Result<ConsentEntry, AppError> {
        let subject_name = self.subject_name(&record).await?;
        Ok(ConsentEntry {
            record,
            subject_name,
        })
    }

    async fn subject_name(&self, consent: &ConsentRecord) -> Result<String, AppError> {
        let name = match consent.subject_type {
            ConsentSubjectType::Device => self
                .store
                .get_device_link(consent.subject_id)
                .await?
                .map(|l| format!("{} {}", l.vendor, l.device_type))
                .unwrap_or_else(|| "unknown device".to_string()),
            ConsentSubjectType::Portal => self
                .store
                .get_user_portal_connection(consent.user_id, consent.subject_id)
                .await?
                .and_then(|c| c.portal_name)
                .unwrap_or_else(|| "unknown portal".to_string()),
            ConsentSubjectType::FamilyBoard => "family board".to_string(),
            ConsentSubjectType::DataProcessing => "data processing".to_string(),
        };
        Ok(name)
    }
}
