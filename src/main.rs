// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Vital-Link API Server
//!
//! Links user accounts to wearable vendors and health portals, and keeps
//! those links alive and their data fresh from a background scheduler.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vital_link::{
    config::Config,
    db::{FirestoreStore, IntegrationStore},
    providers::{MockDeviceProvider, MockPortalProvider, ProviderRegistry, StravaProvider},
    scheduler::SyncScheduler,
    services::{ConsentService, DeviceLinkService, NullSink, PortalConnectionService},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Vital-Link API");

    // Initialize Firestore-backed store
    let store: Arc<dyn IntegrationStore> = Arc::new(
        FirestoreStore::new(&config.gcp_project_id)
            .await
            .expect("Failed to connect to Firestore"),
    );

    // Build the provider registry
    let mut registry = ProviderRegistry::new();
    registry.register_device(Arc::new(StravaProvider::new(
        config.strava_client_id.clone(),
        config.strava_client_secret.clone(),
    )));
    if config.enable_mock_providers {
        registry.register_device(Arc::new(MockDeviceProvider::new()));
        registry.register_portal(Arc::new(MockPortalProvider::new()));
    }
    let registry = Arc::new(registry);
    tracing::info!(
        vendors = ?registry.supported_vendors(),
        portals = ?registry.supported_portals(),
        "Provider registry initialized"
    );

    // Synced datapoints are handed to the external record store; until
    // one is wired in they are counted and discarded.
    let sink = Arc::new(NullSink);

    // Initialize services
    let consents = ConsentService::new(store.clone());
    let devices = DeviceLinkService::new(
        store.clone(),
        registry.clone(),
        consents.clone(),
        sink.clone(),
        config.oauth_redirect_uri.clone(),
    );
    let portals = PortalConnectionService::new(
        store.clone(),
        registry.clone(),
        consents.clone(),
        sink,
    );

    // Start the background sync scheduler
    let scheduler = Arc::new(SyncScheduler::new(store.clone(), devices.clone(), &config));
    let _handles = scheduler.spawn();

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        registry,
        devices,
        portals,
        consents,
    });

    // Build router
    let app = vital_link::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vital_link=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
