// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Device link lifecycle tests: connect, sync, refresh, disconnect.

use chrono::{Duration, Utc};
use std::sync::atomic::Ordering;
use uuid::Uuid;
use vital_link::db::IntegrationStore;
use vital_link::error::AppError;
use vital_link::models::{ConsentSubjectType, DeviceLink, DeviceStatus};

mod common;
use common::{device_scope, harness};

#[tokio::test]
async fn test_connect_creates_active_link_with_consent() {
    let h = harness();
    let user_id = Uuid::new_v4();

    let device = h
        .devices
        .connect(user_id, "mock", "watch", "abc", device_scope())
        .await
        .expect("connect should succeed");

    assert_eq!(device.link.status, DeviceStatus::Active);
    assert!(device.has_active_consent, "consent should be granted");
    assert!(device.link.access_token.is_some());
    assert!(device.link.vendor_user_id.is_some());

    // Initial sync is attempted as part of connect; the mock vendor
    // succeeds, so the link is already current.
    assert!(device.link.last_sync_at.is_some());
}

#[tokio::test]
async fn test_connect_same_vendor_twice_conflicts() {
    let h = harness();
    let user_id = Uuid::new_v4();

    h.devices
        .connect(user_id, "mock", "watch", "abc", device_scope())
        .await
        .unwrap();

    let err = h
        .devices
        .connect(user_id, "mock", "ring", "def", device_scope())
        .await
        .expect_err("second connect for same vendor must conflict");
    assert!(matches!(err, AppError::AlreadyLinked(_)));

    // No second link, no second consent
    let links = h.devices.list(user_id).await.unwrap();
    assert_eq!(links.len(), 1);
    let consents = h.consents.list(user_id).await.unwrap();
    assert_eq!(consents.len(), 1);
}

#[tokio::test]
async fn test_connect_unknown_vendor_is_not_supported() {
    let h = harness();

    let err = h
        .devices
        .connect(Uuid::new_v4(), "unheard-of", "watch", "abc", device_scope())
        .await
        .expect_err("unknown vendor must fail");
    assert!(matches!(err, AppError::NotSupported(_)));
}

#[tokio::test]
async fn test_reconnect_allowed_after_disconnect() {
    let h = harness();
    let user_id = Uuid::new_v4();

    let device = h
        .devices
        .connect(user_id, "mock", "watch", "abc", device_scope())
        .await
        .unwrap();
    h.devices.disconnect(user_id, device.link.id).await.unwrap();

    // A revoked link does not block a new connect for the same vendor
    let again = h
        .devices
        .connect(user_id, "mock", "watch", "xyz", device_scope())
        .await
        .expect("reconnect after disconnect should succeed");
    assert_ne!(again.link.id, device.link.id, "reconnect mints a new link");
}

#[tokio::test]
async fn test_sync_with_expired_token_never_calls_provider() {
    let h = harness();
    let user_id = Uuid::new_v4();

    // Seed an ACTIVE link whose credential is already past expiry
    let mut link = DeviceLink::new(user_id, "recording", "watch");
    link.set_tokens(
        "stale".to_string(),
        Some("refresh".to_string()),
        Utc::now() - Duration::minutes(5),
    );
    h.store.upsert_device_link(&link).await.unwrap();

    let err = h
        .devices
        .sync(user_id, link.id)
        .await
        .expect_err("sync on an expired credential must fail fast");
    assert!(matches!(err, AppError::InvalidState(_)));
    assert_eq!(
        h.fetch_calls.load(Ordering::SeqCst),
        0,
        "provider data fetch must not be called"
    );

    // Lazy expiry detection is reflected in the stored status
    let stored = h.store.get_device_link(link.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DeviceStatus::Expired);
}

#[tokio::test]
async fn test_sync_twice_is_idempotent() {
    let h = harness();
    let user_id = Uuid::new_v4();

    let device = h
        .devices
        .connect(user_id, "recording", "watch", "abc", device_scope())
        .await
        .unwrap();

    let first = h.devices.sync(user_id, device.link.id).await.unwrap();
    let second = h.devices.sync(user_id, device.link.id).await.unwrap();

    assert!(first.is_success());
    assert!(second.is_success());
    assert_eq!(second.records_synced, 0, "no new vendor data");

    let stored = h
        .store
        .get_device_link(device.link.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, DeviceStatus::Active);
    assert!(stored.error_message.is_none());
}

#[tokio::test]
async fn test_failed_sync_marks_error_but_returns_result() {
    let h = harness();
    let user_id = Uuid::new_v4();

    let device = h
        .devices
        .connect(user_id, "flaky", "watch", "abc", device_scope())
        .await
        .expect("connect must survive a failing initial sync");

    // The failing initial sync was recorded, not propagated
    assert_eq!(device.link.status, DeviceStatus::Error);
    assert!(device.link.last_sync_at.is_none());
    assert!(device
        .link
        .error_message
        .as_deref()
        .is_some_and(|m| m.contains("unreachable")));
}

#[tokio::test]
async fn test_refresh_token_extends_expiry() {
    let h = harness();
    let user_id = Uuid::new_v4();

    // Link whose credential is inside the one-hour lookahead window
    let mut link = DeviceLink::new(user_id, "recording", "watch");
    link.set_tokens(
        "old_access".to_string(),
        Some("old_refresh".to_string()),
        Utc::now() + Duration::minutes(20),
    );
    h.store.upsert_device_link(&link).await.unwrap();
    assert!(link.needs_token_refresh(Utc::now(), Duration::hours(1)));

    h.devices.refresh_token(link.id).await.unwrap();

    let stored = h.store.get_device_link(link.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DeviceStatus::Active);
    assert_eq!(stored.access_token.as_deref(), Some("recording_access_2"));
    assert!(
        !stored.needs_token_refresh(Utc::now(), Duration::minutes(30)),
        "fresh credential must be outside the lookahead window"
    );
}

#[tokio::test]
async fn test_refresh_without_refresh_token_is_invalid_state() {
    let h = harness();
    let user_id = Uuid::new_v4();

    let mut link = DeviceLink::new(user_id, "recording", "watch");
    link.set_tokens("access".to_string(), None, Utc::now() + Duration::hours(1));
    h.store.upsert_device_link(&link).await.unwrap();

    let err = h.devices.refresh_token(link.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_failed_refresh_marks_error_and_propagates() {
    let h = harness();
    let user_id = Uuid::new_v4();

    let mut link = DeviceLink::new(user_id, "flaky", "watch");
    link.set_tokens(
        "access".to_string(),
        Some("refresh".to_string()),
        Utc::now() + Duration::minutes(20),
    );
    h.store.upsert_device_link(&link).await.unwrap();

    let err = h
        .devices
        .refresh_token(link.id)
        .await
        .expect_err("refresh failure is actionable and must propagate");
    assert!(matches!(err, AppError::Provider(_)));

    let stored = h.store.get_device_link(link.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DeviceStatus::Error);
}

#[tokio::test]
async fn test_disconnect_clears_credentials_and_consent() {
    let h = harness();
    let user_id = Uuid::new_v4();

    let device = h
        .devices
        .connect(user_id, "mock", "watch", "abc", device_scope())
        .await
        .unwrap();
    let link_id = device.link.id;

    h.devices.disconnect(user_id, link_id).await.unwrap();

    let stored = h.store.get_device_link(link_id).await.unwrap().unwrap();
    assert_eq!(stored.status, DeviceStatus::Revoked);
    assert!(stored.access_token.is_none());
    assert!(stored.refresh_token.is_none());

    let has_consent = h
        .consents
        .has_active_consent(user_id, ConsentSubjectType::Device, link_id)
        .await
        .unwrap();
    assert!(!has_consent, "consent must be revoked on disconnect");
}

#[tokio::test]
async fn test_disconnect_survives_vendor_revoke_failure() {
    let h = harness();
    let user_id = Uuid::new_v4();

    // The flaky vendor errors on revoke_access; disconnect must still
    // revoke locally.
    let mut link = DeviceLink::new(user_id, "flaky", "watch");
    link.set_tokens(
        "access".to_string(),
        Some("refresh".to_string()),
        Utc::now() + Duration::hours(1),
    );
    h.store.upsert_device_link(&link).await.unwrap();
    h.consents
        .grant(user_id, ConsentSubjectType::Device, link.id, device_scope())
        .await
        .unwrap();

    h.devices.disconnect(user_id, link.id).await.unwrap();

    let stored = h.store.get_device_link(link.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DeviceStatus::Revoked);
}

#[tokio::test]
async fn test_sync_unknown_link_is_not_found() {
    let h = harness();

    let err = h
        .devices
        .sync(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_sync_other_users_link_is_not_found() {
    let h = harness();
    let owner = Uuid::new_v4();

    let device = h
        .devices
        .connect(owner, "mock", "watch", "abc", device_scope())
        .await
        .unwrap();

    let err = h
        .devices
        .sync(Uuid::new_v4(), device.link.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
