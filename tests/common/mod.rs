// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared test setup: in-memory store, mock providers and services.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use uuid::Uuid;
use vital_link::config::Config;
use vital_link::db::{IntegrationStore, MemoryStore};
use vital_link::error::AppError;
use vital_link::models::ConsentScope;
use vital_link::providers::{
    DeviceDataProvider, HealthDatapoint, MockDeviceProvider, MockPortalProvider, PortalAuthResult,
    PortalDataProvider, ProviderRegistry, TokenResponse,
};
use vital_link::scheduler::SyncScheduler;
use vital_link::services::{
    ConsentService, DeviceLinkService, NullSink, PortalConnectionService,
};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test connection to the Firestore emulator.
#[allow(dead_code)]
pub async fn test_store() -> vital_link::db::FirestoreStore {
    vital_link::db::FirestoreStore::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Vendor whose data fetch and token refresh always fail with a
/// transport error. Authorization succeeds so links can be created.
#[allow(dead_code)]
pub struct FlakyDeviceProvider;

#[async_trait]
impl DeviceDataProvider for FlakyDeviceProvider {
    fn vendor(&self) -> &str {
        "flaky"
    }

    fn supported_data_types(&self) -> &[&str] {
        &["STEPS"]
    }

    async fn authorize(
        &self,
        _auth_code: &str,
        _redirect_uri: &str,
    ) -> Result<TokenResponse, AppError> {
        Ok(TokenResponse {
            access_token: format!("flaky_access_{}", Uuid::new_v4()),
            refresh_token: Some(format!("flaky_refresh_{}", Uuid::new_v4())),
            expires_in_secs: 3600,
            token_type: "Bearer".to_string(),
            vendor_user_id: None,
        })
    }

    async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenResponse, AppError> {
        Err(AppError::Provider("vendor unreachable".to_string()))
    }

    async fn fetch_health_data(
        &self,
        _access_token: &str,
        _from: NaiveDate,
        _to: NaiveDate,
    ) -> Result<Vec<HealthDatapoint>, AppError> {
        Err(AppError::Provider("vendor unreachable".to_string()))
    }

    async fn revoke_access(&self, _access_token: &str) -> Result<(), AppError> {
        Err(AppError::Provider("vendor unreachable".to_string()))
    }
}

/// Vendor that returns no data and counts fetch calls, for asserting
/// that sync does (or does not) reach the provider.
#[allow(dead_code)]
pub struct RecordingDeviceProvider {
    pub fetch_calls: Arc<AtomicUsize>,
}

impl RecordingDeviceProvider {
    #[allow(dead_code)]
    pub fn new() -> (Self, Arc<AtomicUsize>) {
        let fetch_calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                fetch_calls: fetch_calls.clone(),
            },
            fetch_calls,
        )
    }
}

#[async_trait]
impl DeviceDataProvider for RecordingDeviceProvider {
    fn vendor(&self) -> &str {
        "recording"
    }

    fn supported_data_types(&self) -> &[&str] {
        &["STEPS"]
    }

    async fn authorize(
        &self,
        _auth_code: &str,
        _redirect_uri: &str,
    ) -> Result<TokenResponse, AppError> {
        Ok(TokenResponse {
            access_token: "recording_access".to_string(),
            refresh_token: Some("recording_refresh".to_string()),
            expires_in_secs: 3600,
            token_type: "Bearer".to_string(),
            vendor_user_id: None,
        })
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        Ok(TokenResponse {
            access_token: "recording_access_2".to_string(),
            refresh_token: Some(refresh_token.to_string()),
            expires_in_secs: 3600,
            token_type: "Bearer".to_string(),
            vendor_user_id: None,
        })
    }

    async fn fetch_health_data(
        &self,
        _access_token: &str,
        _from: NaiveDate,
        _to: NaiveDate,
    ) -> Result<Vec<HealthDatapoint>, AppError> {
        self.fetch_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(Vec::new())
    }

    async fn revoke_access(&self, _access_token: &str) -> Result<(), AppError> {
        Ok(())
    }
}

/// Portal that rejects every login.
#[allow(dead_code)]
pub struct DenyingPortalProvider;

#[async_trait]
impl PortalDataProvider for DenyingPortalProvider {
    fn portal_type(&self) -> &str {
        "DENYING"
    }

    async fn authenticate(
        &self,
        _credentials: &HashMap<String, String>,
    ) -> Result<PortalAuthResult, AppError> {
        Ok(PortalAuthResult {
            success: false,
            token: None,
            portal_user_id: None,
            portal_name: None,
        })
    }

    async fn fetch_checkup_records(
        &self,
        _token: &str,
        _from: NaiveDate,
        _to: NaiveDate,
    ) -> Result<Vec<vital_link::providers::CheckupRecord>, AppError> {
        Ok(Vec::new())
    }

    async fn fetch_medical_records(
        &self,
        _token: &str,
        _from: NaiveDate,
        _to: NaiveDate,
    ) -> Result<Vec<vital_link::providers::MedicalRecord>, AppError> {
        Ok(Vec::new())
    }
}

/// Everything a service test needs, wired against the in-memory store.
#[allow(dead_code)]
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub registry: Arc<ProviderRegistry>,
    pub consents: ConsentService,
    pub devices: DeviceLinkService,
    pub portals: PortalConnectionService,
    pub fetch_calls: Arc<AtomicUsize>,
}

impl TestHarness {
    #[allow(dead_code)]
    pub fn scheduler(&self) -> SyncScheduler {
        let store: Arc<dyn IntegrationStore> = self.store.clone();
        SyncScheduler::new(store, self.devices.clone(), &Config::default())
    }
}

/// Build services against a fresh in-memory store.
#[allow(dead_code)]
pub fn harness() -> TestHarness {
    let store = Arc::new(MemoryStore::new());
    let store_dyn: Arc<dyn IntegrationStore> = store.clone();

    let (recording, fetch_calls) = RecordingDeviceProvider::new();

    let mut registry = ProviderRegistry::new();
    registry.register_device(Arc::new(MockDeviceProvider::new()));
    registry.register_device(Arc::new(FlakyDeviceProvider));
    registry.register_device(Arc::new(recording));
    registry.register_portal(Arc::new(MockPortalProvider::new()));
    registry.register_portal(Arc::new(DenyingPortalProvider));
    let registry = Arc::new(registry);

    let sink = Arc::new(NullSink);
    let consents = ConsentService::new(store_dyn.clone());
    let devices = DeviceLinkService::new(
        store_dyn.clone(),
        registry.clone(),
        consents.clone(),
        sink.clone(),
        "http://localhost:8080/oauth/callback".to_string(),
    );
    let portals = PortalConnectionService::new(store_dyn, registry.clone(), consents.clone(), sink);

    TestHarness {
        store,
        registry,
        consents,
        devices,
        portals,
        fetch_calls,
    }
}

/// A typical device consent scope.
#[allow(dead_code)]
pub fn device_scope() -> ConsentScope {
    ConsentScope {
        data_types: vec!["steps".to_string(), "heart_rate".to_string()],
        frequency: "hourly".to_string(),
        retention_period: Some("1year".to_string()),
        ..ConsentScope::default()
    }
}

/// Portal credentials the mock portal accepts.
#[allow(dead_code)]
pub fn portal_credentials() -> HashMap<String, String> {
    let mut credentials = HashMap::new();
    credentials.insert("username".to_string(), "kim".to_string());
    credentials.insert("password".to_string(), "hunter2".to_string());
    credentials
}
