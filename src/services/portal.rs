// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Portal connection orchestrator.
//!
//! Portal authentication is single-shot: there is no refresh credential,
//! and a failed or unsupported attempt is persisted as a terminal row. A
//! connect never errors for "the portal said no": the outcome is encoded
//! in the returned status.

use crate::db::IntegrationStore;
use crate::error::AppError;
use crate::models::{ConsentScope, ConsentSubjectType, PortalConnection, PortalStatus};
use crate::providers::ProviderRegistry;
use crate::services::{ConsentService, HealthDataSink, SyncResult};
use chrono::{Months, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Lookback window for a connection that has never synced (6 months).
const INITIAL_SYNC_LOOKBACK_MONTHS: u32 = 6;

/// Service managing portal connections.
#[derive(Clone)]
pub struct PortalConnectionService {
    store: Arc<dyn IntegrationStore>,
    registry: Arc<ProviderRegistry>,
    consents: ConsentService,
    sink: Arc<dyn HealthDataSink>,
}

impl PortalConnectionService {
    pub fn new(
        store: Arc<dyn IntegrationStore>,
        registry: Arc<ProviderRegistry>,
        consents: ConsentService,
        sink: Arc<dyn HealthDataSink>,
    ) -> Self {
        Self {
            store,
            registry,
            consents,
            sink,
        }
    }

    /// All of a user's portal connections.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<PortalConnection>, AppError> {
        self.store.list_portal_connections(user_id).await
    }

    /// Connect a portal: authenticate, persist the outcome, grant consent
    /// and pull an initial window of records on success.
    ///
    /// Unknown portal types and rejected logins come back as UNSUPPORTED /
    /// FAILED rows without an error and without a consent grant.
    pub async fn connect(
        &self,
        user_id: Uuid,
        portal_type: &str,
        portal_id: Option<String>,
        credentials: &HashMap<String, String>,
    ) -> Result<PortalConnection, AppError> {
        let provider = match self.registry.portal_provider(portal_type) {
            Ok(provider) => provider,
            Err(AppError::NotSupported(_)) => {
                let mut conn = PortalConnection::new(user_id, portal_type, portal_id);
                conn.mark_unsupported();
                self.store.upsert_portal_connection(&conn).await?;
                tracing::info!(
                    connection_id = %conn.id,
                    portal_type = %portal_type,
                    "Portal type not supported"
                );
                return Ok(conn);
            }
            Err(e) => return Err(e),
        };

        let auth = provider.authenticate(credentials).await?;

        if !auth.success {
            let mut conn = PortalConnection::new(user_id, portal_type, portal_id);
            conn.mark_failed("AUTH_FAILED", "portal authentication failed");
            self.store.upsert_portal_connection(&conn).await?;
            tracing::info!(
                connection_id = %conn.id,
                portal_type = %portal_type,
                "Portal authentication rejected"
            );
            return Ok(conn);
        }

        let mut conn = PortalConnection::new(user_id, portal_type, portal_id);
        if let Some(name) = auth.portal_name {
            conn.set_portal_name(name);
        }
        if let Some(portal_user_id) = auth.portal_user_id {
            conn.set_portal_user_id(portal_user_id);
        }
        let token = auth.token.ok_or_else(|| {
            AppError::Provider("portal reported success without a token".to_string())
        })?;
        conn.set_credentials(token.clone());
        conn.mark_active();

        self.store.upsert_portal_connection(&conn).await?;

        let scope = ConsentScope {
            data_types: vec!["checkup".to_string(), "medical".to_string()],
            frequency: "monthly".to_string(),
            retention_period: Some("5years".to_string()),
            ..ConsentScope::default()
        };
        self.consents
            .grant(user_id, ConsentSubjectType::Portal, conn.id, scope)
            .await?;

        tracing::info!(
            connection_id = %conn.id,
            user_id = %user_id,
            portal_type = %portal_type,
            "Portal connected"
        );

        // Best-effort initial pull of the recent record window
        let now = Utc::now();
        let to = now.date_naive();
        let from = Self::lookback_from(to);
        match self.fetch_and_store(&conn, &token, from, to).await {
            Ok(count) => {
                conn.mark_synced(now);
                self.store.upsert_portal_connection(&conn).await?;
                tracing::debug!(connection_id = %conn.id, count, "Initial portal fetch complete");
            }
            Err(e) => {
                tracing::warn!(connection_id = %conn.id, error = %e, "Initial portal fetch failed");
            }
        }

        Ok(conn)
    }

    /// Fetch new records for a connection and mark it current.
    ///
    /// Requires ACTIVE status; anything else is an InvalidState error,
    /// never a silent skip. Provider failures come back as FAILED results.
    pub async fn sync(&self, user_id: Uuid, connection_id: Uuid) -> Result<SyncResult, AppError> {
        let mut conn = self
            .store
            .get_user_portal_connection(user_id, connection_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("portal connection {}", connection_id)))?;

        if conn.status != PortalStatus::Active {
            return Err(AppError::InvalidState(format!(
                "portal connection {} is not in a syncable state",
                connection_id
            )));
        }

        let token = conn.credentials.clone().ok_or_else(|| {
            AppError::InvalidState(format!(
                "portal connection {} has no credential",
                connection_id
            ))
        })?;

        let now = Utc::now();
        let to = now.date_naive();
        let from = conn
            .last_sync_at
            .map(|t| t.date_naive())
            .unwrap_or_else(|| Self::lookback_from(to));

        match self.fetch_and_store(&conn, &token, from, to).await {
            Ok(count) => {
                conn.mark_synced(now);
                self.store.upsert_portal_connection(&conn).await?;
                tracing::info!(connection_id = %connection_id, count, "Portal sync complete");
                Ok(SyncResult::success(count, now))
            }
            Err(e) => {
                tracing::error!(connection_id = %connection_id, error = %e, "Portal sync failed");
                conn.mark_failed("SYNC_FAILED", &e.to_string());
                self.store.upsert_portal_connection(&conn).await?;
                Ok(SyncResult::failure(e.to_string(), now))
            }
        }
    }

    /// Sever a connection: consent revoked with reason "user request",
    /// row terminally revoked.
    pub async fn disconnect(&self, user_id: Uuid, connection_id: Uuid) -> Result<(), AppError> {
        let mut conn = self
            .store
            .get_user_portal_connection(user_id, connection_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("portal connection {}", connection_id)))?;

        if let Some(mut consent) = self
            .store
            .find_active_consent(user_id, ConsentSubjectType::Portal, connection_id)
            .await?
        {
            consent.revoke("user request")?;
            self.store.upsert_consent(&consent).await?;
        }

        conn.revoke();
        self.store.upsert_portal_connection(&conn).await?;

        tracing::info!(connection_id = %connection_id, user_id = %user_id, "Portal disconnected");
        Ok(())
    }

    /// Fetch both record kinds for the window and hand them to the sink.
    async fn fetch_and_store(
        &self,
        conn: &PortalConnection,
        token: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<usize, AppError> {
        let provider = self.registry.portal_provider(&conn.portal_type)?;

        let checkups = provider.fetch_checkup_records(token, from, to).await?;
        let visits = provider.fetch_medical_records(token, from, to).await?;

        self.sink.store_checkup_records(conn, &checkups).await?;
        self.sink.store_medical_records(conn, &visits).await?;

        Ok(checkups.len() + visits.len())
    }

    fn lookback_from(to: NaiveDate) -> NaiveDate {
        to.checked_sub_months(Months::new(INITIAL_SYNC_LOOKBACK_MONTHS))
            .unwrap_or(to)
    }
}
