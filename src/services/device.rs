// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Device link orchestrator.
//!
//! Drives the provider contract for wearable vendors and keeps the link
//! entities and the consent ledger consistent. Writes to any one link are
//! serialized through a per-link mutex so a manual sync and a scheduled
//! sync on the same link cannot lose updates or double-sync.

use crate::db::IntegrationStore;
use crate::error::AppError;
use crate::models::{ConsentScope, ConsentSubjectType, DeviceLink, DeviceStatus};
use crate::providers::{DeviceDataProvider, ProviderRegistry};
use crate::services::{ConsentService, HealthDataSink, SyncResult};
use chrono::{Duration, NaiveDate, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Lookback window for a link that has never synced (7 days).
const INITIAL_SYNC_LOOKBACK_DAYS: i64 = 7;

/// A device link with its consent state, as shown to the user.
#[derive(Debug, Clone)]
pub struct LinkedDevice {
    pub link: DeviceLink,
    pub has_active_consent: bool,
}

/// Shared per-link locks type.
type LinkLocks = Arc<DashMap<Uuid, Arc<Mutex<()>>>>;

/// Service managing device links.
#[derive(Clone)]
pub struct DeviceLinkService {
    store: Arc<dyn IntegrationStore>,
    registry: Arc<ProviderRegistry>,
    consents: ConsentService,
    sink: Arc<dyn HealthDataSink>,
    oauth_redirect_uri: String,
    /// Per-link mutex serializing sync/refresh/disconnect on one link.
    link_locks: LinkLocks,
}

impl DeviceLinkService {
    pub fn new(
        store: Arc<dyn IntegrationStore>,
        registry: Arc<ProviderRegistry>,
        consents: ConsentService,
        sink: Arc<dyn HealthDataSink>,
        oauth_redirect_uri: String,
    ) -> Self {
        Self {
            store,
            registry,
            consents,
            sink,
            oauth_redirect_uri,
            link_locks: Arc::new(DashMap::new()),
        }
    }

    /// All of a user's device links with their consent state.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<LinkedDevice>, AppError> {
        let links = self.store.list_device_links(user_id).await?;

        let mut devices = Vec::with_capacity(links.len());
        for link in links {
            let has_active_consent = self
                .consents
                .has_active_consent(user_id, ConsentSubjectType::Device, link.id)
                .await?;
            devices.push(LinkedDevice {
                link,
                has_active_consent,
            });
        }
        Ok(devices)
    }

    /// Link a new device: exchange the authorization code, persist the
    /// active link, grant consent, and attempt one initial sync.
    ///
    /// The initial sync is best-effort: its failure is recorded on the
    /// link but never aborts the connect.
    pub async fn connect(
        &self,
        user_id: Uuid,
        vendor: &str,
        device_type: &str,
        auth_code: &str,
        scope: ConsentScope,
    ) -> Result<LinkedDevice, AppError> {
        if self
            .store
            .find_device_link_by_vendor(user_id, vendor)
            .await?
            .is_some()
        {
            return Err(AppError::AlreadyLinked(format!(
                "a device is already linked for vendor {}",
                vendor
            )));
        }

        let provider = self.registry.device_provider(vendor)?;
        let token = provider.authorize(auth_code, &self.oauth_redirect_uri).await?;

        let mut link = DeviceLink::new(user_id, vendor, device_type);
        let expires_at = Utc::now() + Duration::seconds(token.expires_in_secs);
        link.set_tokens(token.access_token, token.refresh_token, expires_at);
        if let Some(vendor_user_id) = token.vendor_user_id {
            link.set_vendor_user_id(vendor_user_id);
        }

        self.store.upsert_device_link(&link).await?;
        let link_id = link.id;

        self.consents
            .grant(user_id, ConsentSubjectType::Device, link_id, scope)
            .await?;

        tracing::info!(
            link_id = %link_id,
            user_id = %user_id,
            vendor = %vendor,
            "Device linked"
        );

        // Best-effort initial sync. Leaves last_sync_at unset on failure.
        match self.sync(user_id, link_id).await {
            Ok(result) if !result.is_success() => {
                tracing::warn!(
                    link_id = %link_id,
                    errors = ?result.errors,
                    "Initial sync reported failure"
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(link_id = %link_id, error = %e, "Initial sync failed");
            }
        }

        let link = self
            .store
            .get_device_link(link_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("device link {}", link_id)))?;
        let has_active_consent = self
            .consents
            .has_active_consent(user_id, ConsentSubjectType::Device, link_id)
            .await?;

        Ok(LinkedDevice {
            link,
            has_active_consent,
        })
    }

    /// Fetch new data for a link and mark it current.
    ///
    /// Refuses with InvalidState unless the link is ACTIVE with a live
    /// credential; the provider is never called with an expired token.
    /// A provider failure comes back as a FAILED result, not an error.
    pub async fn sync(&self, user_id: Uuid, link_id: Uuid) -> Result<SyncResult, AppError> {
        let _guard = self.lock_link(link_id).await;

        let mut link = self
            .store
            .get_user_device_link(user_id, link_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("device link {}", link_id)))?;

        let now = Utc::now();
        if !link.can_sync(now) {
            // Surface lazy expiry detection in the stored status
            if link.status == DeviceStatus::Active && link.is_token_expired(now) {
                link.mark_expired();
                self.store.upsert_device_link(&link).await?;
            }
            return Err(AppError::InvalidState(format!(
                "device link {} is not in a syncable state",
                link_id
            )));
        }

        let provider = self.registry.device_provider(&link.vendor)?;
        let access_token = link.access_token.clone().ok_or_else(|| {
            AppError::InvalidState(format!("device link {} has no access credential", link_id))
        })?;

        let to = now.date_naive();
        let from = link
            .last_sync_at
            .map(|t| t.date_naive())
            .unwrap_or_else(|| to - Duration::days(INITIAL_SYNC_LOOKBACK_DAYS));

        let outcome = self
            .fetch_and_store(&link, &access_token, from, to, provider.as_ref())
            .await;

        match outcome {
            Ok(count) => {
                link.mark_synced(now);
                self.store.upsert_device_link(&link).await?;
                tracing::info!(link_id = %link_id, count, "Device sync complete");
                Ok(SyncResult::success(count, now))
            }
            Err(e) => {
                tracing::error!(link_id = %link_id, error = %e, "Device sync failed");
                link.mark_error(&e.to_string());
                self.store.upsert_device_link(&link).await?;
                Ok(SyncResult::failure(e.to_string(), now))
            }
        }
    }

    /// Replace the credential pair before it expires.
    ///
    /// Unlike sync, a provider failure here is propagated: the caller
    /// (scheduler or operator) can act on it.
    pub async fn refresh_token(&self, link_id: Uuid) -> Result<(), AppError> {
        let _guard = self.lock_link(link_id).await;

        let mut link = self
            .store
            .get_device_link(link_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("device link {}", link_id)))?;

        let refresh_token = link.refresh_token.clone().ok_or_else(|| {
            AppError::InvalidState(format!("device link {} has no refresh credential", link_id))
        })?;

        let provider = self.registry.device_provider(&link.vendor)?;

        match provider.refresh_token(&refresh_token).await {
            Ok(token) => {
                let expires_at = Utc::now() + Duration::seconds(token.expires_in_secs);
                link.refresh_tokens(token.access_token, token.refresh_token, expires_at);
                self.store.upsert_device_link(&link).await?;
                tracing::debug!(link_id = %link_id, "Token refreshed");
                Ok(())
            }
            Err(e) => {
                tracing::error!(link_id = %link_id, error = %e, "Token refresh failed");
                link.mark_error(&format!("token refresh failed: {}", e));
                self.store.upsert_device_link(&link).await?;
                Err(e)
            }
        }
    }

    /// Sever a link: best-effort vendor-side revoke, consent revoked with
    /// reason "user request", link terminally revoked.
    pub async fn disconnect(&self, user_id: Uuid, link_id: Uuid) -> Result<(), AppError> {
        let _guard = self.lock_link(link_id).await;

        let mut link = self
            .store
            .get_user_device_link(user_id, link_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("device link {}", link_id)))?;

        if let Some(mut consent) = self
            .store
            .find_active_consent(user_id, ConsentSubjectType::Device, link_id)
            .await?
        {
            // Vendor-side revoke is best-effort: a vendor outage must not
            // keep the user linked.
            if let Some(access_token) = link.access_token.clone() {
                match self.registry.device_provider(&link.vendor) {
                    Ok(provider) => {
                        if let Err(e) = provider.revoke_access(&access_token).await {
                            tracing::warn!(
                                link_id = %link_id,
                                error = %e,
                                "Vendor-side revoke failed"
                            );
                        }
                    }
                    Err(e) => {
                        tracing::warn!(link_id = %link_id, error = %e, "No provider for vendor");
                    }
                }
            }

            consent.revoke("user request")?;
            self.store.upsert_consent(&consent).await?;
        }

        link.revoke();
        self.store.upsert_device_link(&link).await?;

        tracing::info!(link_id = %link_id, user_id = %user_id, "Device disconnected");
        Ok(())
    }

    /// Fetch the window from the vendor and hand it to the data sink.
    async fn fetch_and_store(
        &self,
        link: &DeviceLink,
        access_token: &str,
        from: NaiveDate,
        to: NaiveDate,
        provider: &dyn DeviceDataProvider,
    ) -> Result<usize, AppError> {
        let datapoints = provider.fetch_health_data(access_token, from, to).await?;
        self.sink.store_datapoints(link, &datapoints).await?;
        Ok(datapoints.len())
    }

    /// Acquire the per-link mutex.
    async fn lock_link(&self, link_id: Uuid) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = self
            .link_locks
            .entry(link_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}
