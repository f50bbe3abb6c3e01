// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mock providers for local development and tests.
//!
//! Generate plausible synthetic data deterministically from the date so
//! test assertions stay stable across runs.

use super::{
    CheckupRecord, DeviceDataProvider, HealthDatapoint, MedicalRecord, PortalAuthResult,
    PortalDataProvider, TokenResponse,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveTime};
use std::collections::HashMap;
use uuid::Uuid;

/// Synthetic wearable vendor (vendor id "mock").
pub struct MockDeviceProvider;

impl MockDeviceProvider {
    pub fn new() -> Self {
        Self
    }

    /// Spread a value across [min, max] keyed by the date.
    fn spread(date: NaiveDate, min: i64, max: i64, salt: i64) -> i64 {
        let seed = i64::from(date.num_days_from_ce()) * 31 + salt * 7;
        min + seed.rem_euclid(max - min + 1)
    }
}

impl Default for MockDeviceProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceDataProvider for MockDeviceProvider {
    fn vendor(&self) -> &str {
        "mock"
    }

    fn supported_data_types(&self) -> &[&str] {
        &["STEPS", "HEART_RATE", "SLEEP"]
    }

    async fn authorize(
        &self,
        _auth_code: &str,
        _redirect_uri: &str,
    ) -> Result<TokenResponse, AppError> {
        Ok(TokenResponse {
            access_token: format!("mock_access_token_{}", Uuid::new_v4()),
            refresh_token: Some(format!("mock_refresh_token_{}", Uuid::new_v4())),
            expires_in_secs: 3600,
            token_type: "Bearer".to_string(),
            vendor_user_id: Some(format!("mock_user_{}", &Uuid::new_v4().to_string()[..8])),
        })
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        Ok(TokenResponse {
            access_token: format!("mock_access_token_{}", Uuid::new_v4()),
            refresh_token: Some(refresh_token.to_string()),
            expires_in_secs: 3600,
            token_type: "Bearer".to_string(),
            vendor_user_id: None,
        })
    }

    async fn fetch_health_data(
        &self,
        _access_token: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<HealthDatapoint>, AppError> {
        let mut data = Vec::new();

        let mut current = from;
        while current <= to {
            let measured_at = current.and_time(NaiveTime::MIN).and_utc();

            data.push(HealthDatapoint {
                record_date: current,
                metric_type: "STEPS".to_string(),
                value: serde_json::json!({ "steps": Self::spread(current, 3000, 12000, 1) }),
                measured_at,
            });

            data.push(HealthDatapoint {
                record_date: current,
                metric_type: "HEART_RATE".to_string(),
                value: serde_json::json!({
                    "resting": Self::spread(current, 55, 75, 2),
                    "average": Self::spread(current, 65, 85, 3),
                    "max": Self::spread(current, 100, 150, 4),
                }),
                measured_at,
            });

            data.push(HealthDatapoint {
                record_date: current,
                metric_type: "SLEEP".to_string(),
                value: serde_json::json!({
                    "duration": Self::spread(current, 50, 90, 5) as f64 / 10.0,
                    "quality": Self::spread(current, 60, 95, 6),
                }),
                measured_at,
            });

            current = current.succ_opt().expect("date overflow");
        }

        Ok(data)
    }

    async fn revoke_access(&self, _access_token: &str) -> Result<(), AppError> {
        Ok(())
    }
}

/// Synthetic health portal (portal type "NHIS").
pub struct MockPortalProvider;

impl MockPortalProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MockPortalProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PortalDataProvider for MockPortalProvider {
    fn portal_type(&self) -> &str {
        "NHIS"
    }

    async fn authenticate(
        &self,
        credentials: &HashMap<String, String>,
    ) -> Result<PortalAuthResult, AppError> {
        // Reject obviously bad credentials so the failed-auth path is
        // exercisable; anything else authenticates.
        let rejected = credentials
            .get("password")
            .is_some_and(|p| p.is_empty() || p == "invalid");
        if rejected {
            return Ok(PortalAuthResult {
                success: false,
                token: None,
                portal_user_id: None,
                portal_name: None,
            });
        }

        Ok(PortalAuthResult {
            success: true,
            token: Some(format!("mock_portal_token_{}", Uuid::new_v4())),
            portal_user_id: Some(format!(
                "mock_portal_user_{}",
                &Uuid::new_v4().to_string()[..8]
            )),
            portal_name: Some("National Health Insurance Service".to_string()),
        })
    }

    async fn fetch_checkup_records(
        &self,
        _token: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CheckupRecord>, AppError> {
        let mut records = Vec::new();

        // One checkup on the 15th of each month in range, capped at 3
        let mut current = from;
        while current <= to && records.len() < 3 {
            if current.day() == 15 {
                records.push(CheckupRecord {
                    checkup_date: current,
                    institution_name: "National Health Insurance Service".to_string(),
                    checkup_type: "general".to_string(),
                    results: serde_json::json!({
                        "blood_pressure": { "systolic": 120, "diastolic": 80 },
                        "blood_sugar": 95,
                        "cholesterol": 180,
                        "bmi": 22.5,
                    }),
                });
            }
            current = current.succ_opt().expect("date overflow");
        }

        Ok(records)
    }

    async fn fetch_medical_records(
        &self,
        _token: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<MedicalRecord>, AppError> {
        let mut records = Vec::new();

        // Visits on the 10th/20th/30th, capped at 5
        let mut current = from;
        while current <= to && records.len() < 5 {
            if current.day() % 10 == 0 {
                records.push(MedicalRecord {
                    visit_date: current,
                    institution_name: "University Hospital".to_string(),
                    department: "internal medicine".to_string(),
                    diagnosis: "hypertension".to_string(),
                    details: serde_json::json!({
                        "prescription": "antihypertensive",
                        "symptoms": "headache, dizziness",
                    }),
                });
            }
            current = current.succ_opt().expect("date overflow");
        }

        Ok(records)
    }
}
