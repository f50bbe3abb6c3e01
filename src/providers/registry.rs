// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Provider registry: resolves vendor/portal-type identifiers to concrete
//! providers at call time.
//!
//! Built once at startup from the registered providers. An unknown
//! identifier fails with `AppError::NotSupported`, a different error
//! kind than a transport failure, because the two drive different
//! terminal states (UNSUPPORTED vs FAILED).

use super::{DeviceDataProvider, PortalDataProvider};
use crate::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of all available device and portal providers.
pub struct ProviderRegistry {
    devices: HashMap<String, Arc<dyn DeviceDataProvider>>,
    portals: HashMap<String, Arc<dyn PortalDataProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            devices: HashMap::new(),
            portals: HashMap::new(),
        }
    }

    /// Register a device provider under its own vendor identifier.
    pub fn register_device(&mut self, provider: Arc<dyn DeviceDataProvider>) {
        self.devices.insert(provider.vendor().to_string(), provider);
    }

    /// Register a portal provider under its own portal-type identifier.
    pub fn register_portal(&mut self, provider: Arc<dyn PortalDataProvider>) {
        self.portals
            .insert(provider.portal_type().to_string(), provider);
    }

    /// Resolve a device provider by vendor identifier.
    pub fn device_provider(&self, vendor: &str) -> Result<Arc<dyn DeviceDataProvider>, AppError> {
        self.devices
            .get(vendor)
            .cloned()
            .ok_or_else(|| AppError::NotSupported(format!("unknown device vendor: {}", vendor)))
    }

    /// Resolve a portal provider by portal-type identifier.
    pub fn portal_provider(
        &self,
        portal_type: &str,
    ) -> Result<Arc<dyn PortalDataProvider>, AppError> {
        self.portals
            .get(portal_type)
            .cloned()
            .ok_or_else(|| AppError::NotSupported(format!("unknown portal type: {}", portal_type)))
    }

    /// All registered vendor identifiers.
    pub fn supported_vendors(&self) -> Vec<&str> {
        self.devices.keys().map(String::as_str).collect()
    }

    /// All registered portal-type identifiers.
    pub fn supported_portals(&self) -> Vec<&str> {
        self.portals.keys().map(String::as_str).collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
