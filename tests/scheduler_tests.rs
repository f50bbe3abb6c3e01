// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Scheduler tests: staleness selection, refresh lookahead, and per-item
//! failure isolation.

use chrono::{Duration, Utc};
use uuid::Uuid;
use vital_link::db::IntegrationStore;
use vital_link::models::{DeviceLink, DeviceStatus};

mod common;
use common::harness;

/// Seed an ACTIVE link for the given vendor.
async fn seed_link(
    h: &common::TestHarness,
    vendor: &str,
    expires_in: Duration,
    last_sync_ago: Option<Duration>,
) -> DeviceLink {
    let mut link = DeviceLink::new(Uuid::new_v4(), vendor, "watch");
    link.set_tokens(
        format!("access_{}", link.id),
        Some(format!("refresh_{}", link.id)),
        Utc::now() + expires_in,
    );
    if let Some(ago) = last_sync_ago {
        link.mark_synced(Utc::now() - ago);
    }
    h.store.upsert_device_link(&link).await.unwrap();
    link
}

#[tokio::test]
async fn test_sync_pass_selects_stale_and_never_synced_links() {
    let h = harness();
    let scheduler = h.scheduler();

    // Stale (synced 2h ago), never synced, and fresh (synced just now)
    seed_link(&h, "mock", Duration::hours(6), Some(Duration::hours(2))).await;
    seed_link(&h, "mock", Duration::hours(6), None).await;
    seed_link(&h, "mock", Duration::hours(6), Some(Duration::minutes(1))).await;

    let report = scheduler.run_sync_pass(Utc::now()).await.unwrap();

    assert_eq!(report.attempted, 2, "fresh link must not be re-synced");
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn test_sync_pass_isolates_failing_vendor() {
    let h = harness();
    let scheduler = h.scheduler();

    // Four syncable links; one vendor's calls fail
    for _ in 0..3 {
        seed_link(&h, "mock", Duration::hours(6), Some(Duration::hours(2))).await;
    }
    let flaky = seed_link(&h, "flaky", Duration::hours(6), Some(Duration::hours(2))).await;

    let report = scheduler.run_sync_pass(Utc::now()).await.unwrap();

    assert_eq!(report.attempted, 4);
    assert_eq!(report.succeeded, 3, "healthy links must still sync");
    assert_eq!(report.failed, 1, "exactly the failing vendor's link fails");

    // The failing link carries its error; the healthy ones are current
    let stored = h.store.get_device_link(flaky.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DeviceStatus::Error);
}

#[tokio::test]
async fn test_refresh_pass_only_touches_links_inside_lookahead() {
    let h = harness();
    let scheduler = h.scheduler();

    // Expiring within the 1h lookahead vs comfortably later
    let expiring = seed_link(&h, "recording", Duration::minutes(20), None).await;
    let fresh = seed_link(&h, "recording", Duration::hours(6), None).await;

    let report = scheduler.run_refresh_pass(Utc::now()).await.unwrap();

    assert_eq!(report.attempted, 1);
    assert_eq!(report.refreshed, 1);
    assert_eq!(report.failed, 0);

    let stored = h.store.get_device_link(expiring.id).await.unwrap().unwrap();
    assert!(
        stored.token_expires_at.unwrap() > Utc::now() + Duration::minutes(30),
        "expiry must be extended"
    );

    let untouched = h.store.get_device_link(fresh.id).await.unwrap().unwrap();
    assert_eq!(untouched.access_token, fresh.access_token);
}

#[tokio::test]
async fn test_refresh_pass_isolates_failing_vendor() {
    let h = harness();
    let scheduler = h.scheduler();

    seed_link(&h, "recording", Duration::minutes(20), None).await;
    seed_link(&h, "recording", Duration::minutes(20), None).await;
    let flaky = seed_link(&h, "flaky", Duration::minutes(20), None).await;

    let report = scheduler.run_refresh_pass(Utc::now()).await.unwrap();

    assert_eq!(report.attempted, 3);
    assert_eq!(report.refreshed, 2);
    assert_eq!(report.failed, 1);

    let stored = h.store.get_device_link(flaky.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DeviceStatus::Error);
}

#[tokio::test]
async fn test_passes_skip_non_active_links() {
    let h = harness();
    let scheduler = h.scheduler();

    // Revoked and errored links are never picked up by either loop
    let mut revoked = seed_link(&h, "mock", Duration::minutes(20), Some(Duration::hours(2))).await;
    revoked.revoke();
    h.store.upsert_device_link(&revoked).await.unwrap();

    let mut errored = seed_link(&h, "mock", Duration::minutes(20), Some(Duration::hours(2))).await;
    errored.mark_error("previous failure");
    h.store.upsert_device_link(&errored).await.unwrap();

    let sync_report = scheduler.run_sync_pass(Utc::now()).await.unwrap();
    let refresh_report = scheduler.run_refresh_pass(Utc::now()).await.unwrap();

    assert_eq!(sync_report.attempted, 0);
    assert_eq!(refresh_report.attempted, 0);
}

#[tokio::test]
async fn test_partial_state_survives_between_passes() {
    let h = harness();
    let scheduler = h.scheduler();

    // A pass that fails one link leaves the others durably synced; the
    // next pass retries only what still qualifies.
    seed_link(&h, "mock", Duration::hours(6), Some(Duration::hours(2))).await;
    seed_link(&h, "flaky", Duration::hours(6), Some(Duration::hours(2))).await;

    let first = scheduler.run_sync_pass(Utc::now()).await.unwrap();
    assert_eq!(first.succeeded, 1);
    assert_eq!(first.failed, 1);

    // The healthy link is now fresh and the failed one is in ERROR, so
    // a second pass finds nothing to do.
    let second = scheduler.run_sync_pass(Utc::now()).await.unwrap();
    assert_eq!(second.attempted, 0);
}
