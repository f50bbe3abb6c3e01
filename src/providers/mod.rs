// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Vendor integration layer.
//!
//! Every wearable vendor implements [`DeviceDataProvider`] and every
//! health portal implements [`PortalDataProvider`]; nothing outside this
//! module knows vendor specifics. Providers signal "the vendor said no"
//! through result values (`success` flags, empty lists), never through
//! errors: an `Err` from a provider always means a transport or protocol
//! failure and is treated as retryable by callers.

pub mod mock;
pub mod registry;
pub mod strava;

pub use mock::{MockDeviceProvider, MockPortalProvider};
pub use registry::ProviderRegistry;
pub use strava::StravaProvider;

use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// OAuth token pair returned by a vendor.
#[derive(Debug, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    /// Not all vendors rotate refresh tokens on refresh
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires
    pub expires_in_secs: i64,
    pub token_type: String,
    /// The vendor's own identifier for the user, when the vendor reports one
    pub vendor_user_id: Option<String>,
}

/// Outcome of a portal authentication attempt.
///
/// A rejected login is a normal outcome (`success: false`), not an error.
#[derive(Debug, Clone)]
pub struct PortalAuthResult {
    pub success: bool,
    pub token: Option<String>,
    pub portal_user_id: Option<String>,
    pub portal_name: Option<String>,
}

/// One health datapoint fetched from a vendor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthDatapoint {
    pub record_date: NaiveDate,
    /// Metric category ("STEPS", "HEART_RATE", "SLEEP", "ACTIVITY", ...)
    pub metric_type: String,
    /// Vendor-shaped measurement payload
    pub value: serde_json::Value,
    pub measured_at: DateTime<Utc>,
}

/// One checkup result fetched from a portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckupRecord {
    pub checkup_date: NaiveDate,
    pub institution_name: String,
    pub checkup_type: String,
    pub results: serde_json::Value,
}

/// One medical visit record fetched from a portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub visit_date: NaiveDate,
    pub institution_name: String,
    pub department: String,
    pub diagnosis: String,
    pub details: serde_json::Value,
}

/// Contract implemented by every wearable vendor integration.
#[async_trait]
pub trait DeviceDataProvider: Send + Sync {
    /// Vendor identifier used as the registry key.
    fn vendor(&self) -> &str;

    /// Data types this vendor can deliver.
    fn supported_data_types(&self) -> &[&str];

    /// Exchange an OAuth authorization code for a token pair.
    async fn authorize(
        &self,
        auth_code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AppError>;

    /// Exchange a refresh token for a fresh token pair.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError>;

    /// Fetch health datapoints for a date range.
    async fn fetch_health_data(
        &self,
        access_token: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<HealthDatapoint>, AppError>;

    /// Revoke our access on the vendor side.
    async fn revoke_access(&self, access_token: &str) -> Result<(), AppError>;
}

/// Contract implemented by every health portal integration.
#[async_trait]
pub trait PortalDataProvider: Send + Sync {
    /// Portal type identifier used as the registry key.
    fn portal_type(&self) -> &str;

    /// Authenticate with user-supplied credentials.
    async fn authenticate(
        &self,
        credentials: &HashMap<String, String>,
    ) -> Result<PortalAuthResult, AppError>;

    /// Fetch checkup results for a date range.
    async fn fetch_checkup_records(
        &self,
        token: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CheckupRecord>, AppError>;

    /// Fetch medical visit records for a date range.
    async fn fetch_medical_records(
        &self,
        token: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<MedicalRecord>, AppError>;
}
