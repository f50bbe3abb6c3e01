// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Integration API routes: device links, portal connections, consents.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{
    ConsentScope, ConsentStatus, ConsentSubjectType, DeviceStatus, PortalConnection, PortalStatus,
};
use crate::services::{ConsentEntry, LinkedDevice, SyncResult};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Integration routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/integration/devices", get(list_devices))
        .route("/v1/integration/devices", post(connect_device))
        .route("/v1/integration/devices/{device_id}/sync", post(sync_device))
        .route("/v1/integration/devices/{device_id}", delete(disconnect_device))
        .route("/v1/integration/portals", get(list_portals))
        .route("/v1/integration/portals", post(connect_portal))
        .route("/v1/integration/portals/{portal_id}/sync", post(sync_portal))
        .route("/v1/integration/portals/{portal_id}", delete(disconnect_portal))
        .route("/v1/integration/consents", get(list_consents))
        .route("/v1/integration/consents", post(grant_consent))
        .route("/v1/integration/consents/{consent_id}", delete(revoke_consent))
}

// ─── Request DTOs ────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct ConsentScopeRequest {
    #[validate(length(min = 1, message = "data types are required"))]
    pub data_types: Vec<String>,
    #[validate(length(min = 1, message = "sync frequency is required"))]
    pub frequency: String,
    pub retention_period: Option<String>,
    pub sharing_allowed: Option<HashMap<String, bool>>,
}

impl From<ConsentScopeRequest> for ConsentScope {
    fn from(req: ConsentScopeRequest) -> Self {
        ConsentScope {
            data_types: req.data_types,
            frequency: req.frequency,
            retention_period: req.retention_period,
            sharing_allowed: req.sharing_allowed,
            ..ConsentScope::default()
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct DeviceConnectRequest {
    #[validate(length(min = 1, message = "vendor is required"))]
    pub vendor: String,
    #[validate(length(min = 1, message = "device type is required"))]
    pub device_type: String,
    #[validate(length(min = 1, message = "auth code is required"))]
    pub auth_code: String,
    #[validate(nested)]
    pub consent_scope: ConsentScopeRequest,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PortalConnectRequest {
    #[validate(length(min = 1, message = "portal type is required"))]
    pub portal_type: String,
    pub portal_id: Option<String>,
    pub credentials: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct RevokeConsentRequest {
    pub revoke_reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GrantConsentRequest {
    pub subject_type: ConsentSubjectType,
    pub subject_id: Uuid,
    #[validate(nested)]
    pub scope: ConsentScopeRequest,
}

// ─── Response DTOs ───────────────────────────────────────────

#[derive(Serialize)]
pub struct DeviceLinkResponse {
    pub device_id: Uuid,
    pub vendor: String,
    pub device_type: String,
    pub status: DeviceStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub has_active_consent: bool,
}

impl From<LinkedDevice> for DeviceLinkResponse {
    fn from(device: LinkedDevice) -> Self {
        Self {
            device_id: device.link.id,
            vendor: device.link.vendor,
            device_type: device.link.device_type,
            status: device.link.status,
            last_sync_at: device.link.last_sync_at,
            has_active_consent: device.has_active_consent,
        }
    }
}

#[derive(Serialize)]
pub struct PortalConnectionResponse {
    pub portal_id: Uuid,
    pub portal_type: String,
    pub portal_name: Option<String>,
    pub status: PortalStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl From<PortalConnection> for PortalConnectionResponse {
    fn from(conn: PortalConnection) -> Self {
        Self {
            portal_id: conn.id,
            portal_type: conn.portal_type,
            portal_name: conn.portal_name,
            status: conn.status,
            last_sync_at: conn.last_sync_at,
        }
    }
}

#[derive(Serialize)]
pub struct ConsentResponse {
    pub consent_id: Uuid,
    pub subject_type: ConsentSubjectType,
    pub subject_name: String,
    pub scope: ConsentScope,
    pub status: ConsentStatus,
    pub consented_at: DateTime<Utc>,
}

impl From<ConsentEntry> for ConsentResponse {
    fn from(entry: ConsentEntry) -> Self {
        Self {
            consent_id: entry.record.id,
            subject_type: entry.record.subject_type,
            subject_name: entry.subject_name,
            scope: entry.record.scope,
            status: entry.record.status,
            consented_at: entry.record.consented_at,
        }
    }
}

fn validate<T: Validate>(req: &T) -> Result<()> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))
}

// ─── Device Link API ─────────────────────────────────────────

async fn list_devices(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<DeviceLinkResponse>>> {
    let devices = state.devices.list(user.user_id).await?;
    Ok(Json(devices.into_iter().map(Into::into).collect()))
}

async fn connect_device(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<DeviceConnectRequest>,
) -> Result<(StatusCode, Json<DeviceLinkResponse>)> {
    validate(&req)?;

    let device = state
        .devices
        .connect(
            user.user_id,
            &req.vendor,
            &req.device_type,
            &req.auth_code,
            req.consent_scope.into(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(device.into())))
}

async fn sync_device(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(device_id): Path<Uuid>,
) -> Result<Json<SyncResult>> {
    let result = state.devices.sync(user.user_id, device_id).await?;
    Ok(Json(result))
}

async fn disconnect_device(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(device_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.devices.disconnect(user.user_id, device_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Portal Connection API ───────────────────────────────────

async fn list_portals(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<PortalConnectionResponse>>> {
    let connections = state.portals.list(user.user_id).await?;
    Ok(Json(connections.into_iter().map(Into::into).collect()))
}

async fn connect_portal(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<PortalConnectRequest>,
) -> Result<(StatusCode, Json<PortalConnectionResponse>)> {
    validate(&req)?;

    let connection = state
        .portals
        .connect(user.user_id, &req.portal_type, req.portal_id, &req.credentials)
        .await?;

    Ok((StatusCode::CREATED, Json(connection.into())))
}

async fn sync_portal(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(portal_id): Path<Uuid>,
) -> Result<Json<SyncResult>> {
    let result = state.portals.sync(user.user_id, portal_id).await?;
    Ok(Json(result))
}

async fn disconnect_portal(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(portal_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.portals.disconnect(user.user_id, portal_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Consent API ─────────────────────────────────────────────

async fn list_consents(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<ConsentResponse>>> {
    let consents = state.consents.list(user.user_id).await?;
    Ok(Json(consents.into_iter().map(Into::into).collect()))
}

async fn grant_consent(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<GrantConsentRequest>,
) -> Result<(StatusCode, Json<ConsentResponse>)> {
    validate(&req)?;

    let record = state
        .consents
        .grant(user.user_id, req.subject_type, req.subject_id, req.scope.into())
        .await?;
    let entry = state.consents.describe(record).await?;

    Ok((StatusCode::CREATED, Json(entry.into())))
}

async fn revoke_consent(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(consent_id): Path<Uuid>,
    body: axum::body::Bytes,
) -> Result<StatusCode> {
    // The revoke reason body is optional
    let reason = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<RevokeConsentRequest>(&body)
            .map_err(|_| AppError::Validation("invalid revoke request body".to_string()))?
            .revoke_reason
    };
    let reason = reason.unwrap_or_else(|| "user request".to_string());

    state
        .consents
        .revoke(user.user_id, consent_id, &reason)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
