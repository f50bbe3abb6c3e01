// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Write sink for synced health data.
//!
//! Storage and analytics of the datapoints themselves live in an external
//! time-series/record store; the orchestrator only hands fetched records
//! across this seam.

use crate::error::AppError;
use crate::models::{DeviceLink, PortalConnection};
use crate::providers::{CheckupRecord, HealthDatapoint, MedicalRecord};
use async_trait::async_trait;

/// Destination for fetched health data.
#[async_trait]
pub trait HealthDataSink: Send + Sync {
    async fn store_datapoints(
        &self,
        link: &DeviceLink,
        datapoints: &[HealthDatapoint],
    ) -> Result<(), AppError>;

    async fn store_checkup_records(
        &self,
        conn: &PortalConnection,
        records: &[CheckupRecord],
    ) -> Result<(), AppError>;

    async fn store_medical_records(
        &self,
        conn: &PortalConnection,
        records: &[MedicalRecord],
    ) -> Result<(), AppError>;
}

/// Sink that logs counts and discards the data.
///
/// Used until a real record store is wired in, and by tests that only
/// care about sync bookkeeping.
pub struct NullSink;

#[async_trait]
impl HealthDataSink for NullSink {
    async fn store_datapoints(
        &self,
        link: &DeviceLink,
        datapoints: &[HealthDatapoint],
    ) -> Result<(), AppError> {
        tracing::debug!(
            link_id = %link.id,
            vendor = %link.vendor,
            count = datapoints.len(),
            "Discarding synced datapoints (no sink configured)"
        );
        Ok(())
    }

    async fn store_checkup_records(
        &self,
        conn: &PortalConnection,
        records: &[CheckupRecord],
    ) -> Result<(), AppError> {
        tracing::debug!(
            connection_id = %conn.id,
            portal_type = %conn.portal_type,
            count = records.len(),
            "Discarding synced checkup records (no sink configured)"
        );
        Ok(())
    }

    async fn store_medical_records(
        &self,
        conn: &PortalConnection,
        records: &[MedicalRecord],
    ) -> Result<(), AppError> {
        tracing::debug!(
            connection_id = %conn.id,
            portal_type = %conn.portal_type,
            count = records.len(),
            "Discarding synced medical records (no sink configured)"
        );
        Ok(())
    }
}
