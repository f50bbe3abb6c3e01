// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Vital-Link: external device & health-portal integration engine
//!
//! This crate links user accounts to third-party wearables and health
//! portals, enforces consent before any data is pulled, and keeps the
//! links alive and fresh from a background scheduler.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod providers;
pub mod routes;
pub mod scheduler;
pub mod services;

use config::Config;
use db::IntegrationStore;
use providers::ProviderRegistry;
use services::{ConsentService, DeviceLinkService, PortalConnectionService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn IntegrationStore>,
    pub registry: Arc<ProviderRegistry>,
    pub devices: DeviceLinkService,
    pub portals: PortalConnectionService,
    pub consents: ConsentService,
}
