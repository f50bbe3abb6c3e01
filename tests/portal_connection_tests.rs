// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Portal connection lifecycle tests.

use std::collections::HashMap;
use uuid::Uuid;
use vital_link::db::IntegrationStore;
use vital_link::error::AppError;
use vital_link::models::{ConsentSubjectType, PortalStatus};

mod common;
use common::{harness, portal_credentials};

#[tokio::test]
async fn test_connect_known_portal_activates_and_grants_consent() {
    let h = harness();
    let user_id = Uuid::new_v4();

    let conn = h
        .portals
        .connect(user_id, "NHIS", None, &portal_credentials())
        .await
        .expect("connect should succeed");

    assert_eq!(conn.status, PortalStatus::Active);
    assert_eq!(
        conn.portal_name.as_deref(),
        Some("National Health Insurance Service")
    );
    assert!(conn.portal_user_id.is_some());

    let has_consent = h
        .consents
        .has_active_consent(user_id, ConsentSubjectType::Portal, conn.id)
        .await
        .unwrap();
    assert!(has_consent);

    // Initial record pull succeeded, so the connection is already current
    let stored = h
        .store
        .get_user_portal_connection(user_id, conn.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.last_sync_at.is_some());
}

#[tokio::test]
async fn test_connect_unknown_portal_type_is_unsupported_without_error() {
    let h = harness();
    let user_id = Uuid::new_v4();

    let conn = h
        .portals
        .connect(user_id, "UNSUPPORTED_TYPE", None, &HashMap::new())
        .await
        .expect("unsupported portal type must not error");

    assert_eq!(conn.status, PortalStatus::Unsupported);

    // No consent is created for an unsupported portal
    let has_consent = h
        .consents
        .has_active_consent(user_id, ConsentSubjectType::Portal, conn.id)
        .await
        .unwrap();
    assert!(!has_consent);
    assert!(h.consents.list(user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_connect_rejected_login_is_failed_without_error() {
    let h = harness();
    let user_id = Uuid::new_v4();

    let conn = h
        .portals
        .connect(user_id, "DENYING", None, &portal_credentials())
        .await
        .expect("rejected login must not error");

    assert_eq!(conn.status, PortalStatus::Failed);
    assert_eq!(conn.error_code.as_deref(), Some("AUTH_FAILED"));
    assert!(conn.credentials.is_none());
    assert!(h.consents.list(user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_new_connect_attempt_creates_new_row() {
    let h = harness();
    let user_id = Uuid::new_v4();

    let mut bad_credentials = portal_credentials();
    bad_credentials.insert("password".to_string(), "invalid".to_string());

    let failed = h
        .portals
        .connect(user_id, "NHIS", None, &bad_credentials)
        .await
        .unwrap();
    assert_eq!(failed.status, PortalStatus::Failed);

    let succeeded = h
        .portals
        .connect(user_id, "NHIS", None, &portal_credentials())
        .await
        .unwrap();
    assert_eq!(succeeded.status, PortalStatus::Active);
    assert_ne!(failed.id, succeeded.id, "each attempt is its own row");

    let all = h.portals.list(user_id).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_sync_requires_active_status() {
    let h = harness();
    let user_id = Uuid::new_v4();

    let conn = h
        .portals
        .connect(user_id, "DENYING", None, &portal_credentials())
        .await
        .unwrap();
    assert_eq!(conn.status, PortalStatus::Failed);

    let err = h
        .portals
        .sync(user_id, conn.id)
        .await
        .expect_err("sync on a non-active connection is a domain error");
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_sync_active_connection_counts_both_record_kinds() {
    let h = harness();
    let user_id = Uuid::new_v4();

    let conn = h
        .portals
        .connect(user_id, "NHIS", None, &portal_credentials())
        .await
        .unwrap();

    let result = h.portals.sync(user_id, conn.id).await.unwrap();
    assert!(result.is_success());
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn test_disconnect_revokes_connection_and_consent() {
    let h = harness();
    let user_id = Uuid::new_v4();

    let conn = h
        .portals
        .connect(user_id, "NHIS", None, &portal_credentials())
        .await
        .unwrap();

    h.portals.disconnect(user_id, conn.id).await.unwrap();

    let stored = h
        .store
        .get_user_portal_connection(user_id, conn.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PortalStatus::Revoked);
    assert!(stored.credentials.is_none());

    let has_consent = h
        .consents
        .has_active_consent(user_id, ConsentSubjectType::Portal, conn.id)
        .await
        .unwrap();
    assert!(!has_consent);
}

#[tokio::test]
async fn test_sync_unknown_connection_is_not_found() {
    let h = harness();

    let err = h
        .portals
        .sync(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
