// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed store with typed operations.
//!
//! Documents are keyed by entity id; timestamps are serialized as RFC3339
//! strings so range filters compare correctly.

use crate::db::{collections, IntegrationStore};
use crate::error::AppError;
use crate::models::{
    ConsentRecord, ConsentStatus, ConsentSubjectType, DeviceLink, DeviceStatus, PortalConnection,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreStore {
    client: firestore::FirestoreDb,
}

impl FirestoreStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    /// Upsert a document keyed by id in the given collection.
    async fn upsert<T: serde::Serialize + for<'de> serde::Deserialize<'de> + Sync + Send>(
        &self,
        collection: &str,
        id: Uuid,
        object: &T,
    ) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id.to_string())
            .object(object)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Fetch a document by id from the given collection.
    async fn get_by_id<T: for<'de> serde::Deserialize<'de> + Send>(
        &self,
        collection: &str,
        id: Uuid,
    ) -> Result<Option<T>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(&id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[async_trait]
impl IntegrationStore for FirestoreStore {
    // ─── Device Links ────────────────────────────────────────────

    async fn upsert_device_link(&self, link: &DeviceLink) -> Result<(), AppError> {
        self.upsert(collections::DEVICE_LINKS, link.id, link).await
    }

    async fn get_device_link(&self, id: Uuid) -> Result<Option<DeviceLink>, AppError> {
        self.get_by_id(collections::DEVICE_LINKS, id).await
    }

    async fn get_user_device_link(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<DeviceLink>, AppError> {
        let link: Option<DeviceLink> = self.get_by_id(collections::DEVICE_LINKS, id).await?;
        Ok(link.filter(|l| l.user_id == user_id))
    }

    async fn find_device_link_by_vendor(
        &self,
        user_id: Uuid,
        vendor: &str,
    ) -> Result<Option<DeviceLink>, AppError> {
        let vendor = vendor.to_string();
        let links: Vec<DeviceLink> = self
            .client
            .fluent()
            .select()
            .from(collections::DEVICE_LINKS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.to_string()),
                    q.field("vendor").eq(vendor.clone()),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(links
            .into_iter()
            .find(|l| l.status != DeviceStatus::Revoked))
    }

    async fn list_device_links(&self, user_id: Uuid) -> Result<Vec<DeviceLink>, AppError> {
        self.client
            .fluent()
            .select()
            .from(collections::DEVICE_LINKS)
            .filter(move |q| q.field("user_id").eq(user_id.to_string()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Only the status predicate runs in Firestore; the null-aware time
    /// filters (last_sync_at may be unset) are applied client-side.
    async fn list_active_device_links(&self) -> Result<Vec<DeviceLink>, AppError> {
        self.client
            .fluent()
            .select()
            .from(collections::DEVICE_LINKS)
            .filter(|q| q.field("status").eq("ACTIVE"))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
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
        self.upsert(collections::PORTAL_CONNECTIONS, conn.id, conn)
            .await
    }

    async fn get_user_portal_connection(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<PortalConnection>, AppError> {
        let conn: Option<PortalConnection> =
            self.get_by_id(collections::PORTAL_CONNECTIONS, id).await?;
        Ok(conn.filter(|c| c.user_id == user_id))
    }

    async fn list_portal_connections(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<PortalConnection>, AppError> {
        self.client
            .fluent()
            .select()
            .from(collections::PORTAL_CONNECTIONS)
            .filter(move |q| q.field("user_id").eq(user_id.to_string()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Consent Records ─────────────────────────────────────────

    async fn upsert_consent(&self, consent: &ConsentRecord) -> Result<(), AppError> {
        self.upsert(collections::CONSENT_RECORDS, consent.id, consent)
            .await
    }

    async fn get_consent(&self, id: Uuid) -> Result<Option<ConsentRecord>, AppError> {
        self.get_by_id(collections::CONSENT_RECORDS, id).await
    }

    async fn find_active_consent(
        &self,
        user_id: Uuid,
        subject_type: ConsentSubjectType,
        subject_id: Uuid,
    ) -> Result<Option<ConsentRecord>, AppError> {
        let consents: Vec<ConsentRecord> = self
            .client
            .fluent()
            .select()
            .from(collections::CONSENT_RECORDS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.to_string()),
                    q.field("subject_id").eq(subject_id.to_string()),
                    q.field("status").eq("ACTIVE"),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(consents
            .into_iter()
            .find(|c| c.subject_type == subject_type && c.status == ConsentStatus::Active))
    }

    async fn list_consents(&self, user_id: Uuid) -> Result<Vec<ConsentRecord>, AppError> {
        let mut consents: Vec<ConsentRecord> = self
            .client
            .fluent()
            .select()
            .from(collections::CONSENT_RECORDS)
            .filter(move |q| q.field("user_id").eq(user_id.to_string()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        consents.sort_by(|a, b| b.consented_at.cmp(&a.consented_at));
        Ok(consents)
    }
}
