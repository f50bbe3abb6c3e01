// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Background sync scheduler.
//!
//! Two independent timed loops keep device links alive and their data
//! fresh without any user request:
//! - a data sync loop (coarse cadence) re-syncs ACTIVE links whose data
//!   has gone stale;
//! - a token refresh loop (finer cadence) refreshes credentials that
//!   expire within the lookahead window.
//!
//! Discovery is one bulk query; every per-link action is individually
//! caught, so one failing vendor call never blocks the rest of the batch,
//! and a loop-level catch leaves the next scheduled run to retry.

use crate::config::Config;
use crate::db::IntegrationStore;
use crate::error::AppError;
use crate::services::DeviceLinkService;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Counters from one data sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncRunReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Counters from one token refresh pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshRunReport {
    pub attempted: usize,
    pub refreshed: usize,
    pub failed: usize,
}

/// Long-lived background scheduler with injected dependencies.
pub struct SyncScheduler {
    store: Arc<dyn IntegrationStore>,
    devices: DeviceLinkService,
    sync_interval: Duration,
    refresh_interval: Duration,
    refresh_lookahead: Duration,
}

impl SyncScheduler {
    pub fn new(store: Arc<dyn IntegrationStore>, devices: DeviceLinkService, config: &Config) -> Self {
        Self {
            store,
            devices,
            sync_interval: config.sync_interval,
            refresh_interval: config.refresh_interval,
            refresh_lookahead: config.refresh_lookahead,
        }
    }

    /// Spawn both loops as detached tasks. They run until the process
    /// shuts down; an in-flight pass abandoned at shutdown is safely
    /// retried on the next start.
    pub fn spawn(self: Arc<Self>) -> (JoinHandle<()>, JoinHandle<()>) {
        let sync_handle = {
            let scheduler = Arc::clone(&self);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(scheduler.sync_interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                ticker.tick().await; // first tick fires immediately; wait a full interval instead
                loop {
                    ticker.tick().await;
                    if let Err(e) = scheduler.run_sync_pass(Utc::now()).await {
                        tracing::error!(error = %e, "Device sync pass aborted");
                    }
                }
            })
        };

        let refresh_handle = {
            let scheduler = Arc::clone(&self);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(scheduler.refresh_interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if let Err(e) = scheduler.run_refresh_pass(Utc::now()).await {
                        tracing::error!(error = %e, "Token refresh pass aborted");
                    }
                }
            })
        };

        tracing::info!(
            sync_interval_secs = self.sync_interval.as_secs(),
            refresh_interval_secs = self.refresh_interval.as_secs(),
            refresh_lookahead_secs = self.refresh_lookahead.as_secs(),
            "Sync scheduler started"
        );

        (sync_handle, refresh_handle)
    }

    /// One data sync pass: sync every ACTIVE link whose last sync is
    /// older than the loop interval (or missing).
    pub async fn run_sync_pass(&self, now: DateTime<Utc>) -> Result<SyncRunReport, AppError> {
        tracing::info!("Device sync pass starting");

        let threshold = now - chrono_interval(self.sync_interval);
        let links = self.store.list_links_needing_sync(threshold).await?;

        let mut report = SyncRunReport::default();
        for link in links {
            report.attempted += 1;
            match self.devices.sync(link.user_id, link.id).await {
                Ok(result) if result.is_success() => report.succeeded += 1,
                Ok(result) => {
                    tracing::warn!(
                        link_id = %link.id,
                        errors = ?result.errors,
                        "Scheduled sync reported failure"
                    );
                    report.failed += 1;
                }
                Err(e) => {
                    tracing::error!(link_id = %link.id, error = %e, "Scheduled sync failed");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            "Device sync pass complete"
        );
        Ok(report)
    }

    /// One token refresh pass: refresh every ACTIVE link whose credential
    /// expires within the lookahead window.
    pub async fn run_refresh_pass(&self, now: DateTime<Utc>) -> Result<RefreshRunReport, AppError> {
        tracing::info!("Token refresh pass starting");

        let threshold = now + chrono_interval(self.refresh_lookahead);
        let links = self.store.list_links_needing_refresh(threshold).await?;

        let mut report = RefreshRunReport::default();
        for link in links {
            report.attempted += 1;
            match self.devices.refresh_token(link.id).await {
                Ok(()) => {
                    tracing::debug!(link_id = %link.id, "Scheduled token refresh complete");
                    report.refreshed += 1;
                }
                Err(e) => {
                    tracing::error!(link_id = %link.id, error = %e, "Scheduled token refresh failed");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            attempted = report.attempted,
            refreshed = report.refreshed,
            failed = report.failed,
            "Token refresh pass complete"
        );
        Ok(report)
    }
}

/// Convert a std interval into chrono arithmetic terms.
fn chrono_interval(interval: Duration) -> chrono::Duration {
    chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::hours(1))
}
