//! Permissions module.

use std::sync::{Arc, OnceLock};

use permissions_sdk::{PermissionStore, PermissionsClient};
use tracing::info;

use crate::config::PermissionsConfig;
use crate::domain::{PermissionsLocalClient, Service};

/// Permissions module.
///
/// Wires the guard registry, graph cache and domain service over a host
/// supplied store and hands out the [`PermissionsClient`]. Initialization
/// happens once; the service is kept for hosts that need direct access.
pub struct PermissionsModule {
    service: OnceLock<Arc<Service>>,
}

impl Default for PermissionsModule {
    fn default() -> Self {
        Self {
            service: OnceLock::new(),
        }
    }
}

impl PermissionsModule {
    pub const MODULE_NAME: &'static str = "permissions";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the config, build the service and return the client.
    ///
    /// # Errors
    ///
    /// - Invalid configuration
    /// - The module was already initialized
    #[tracing::instrument(skip_all, fields(default_guard = %cfg.default_guard))]
    pub fn init(
        &self,
        cfg: &PermissionsConfig,
        store: Arc<dyn PermissionStore>,
    ) -> anyhow::Result<Arc<dyn PermissionsClient>> {
        cfg.validate()?;
        info!(
            guards = cfg.guards.len(),
            cache_ttl = %humantime::format_duration(cfg.cache_ttl),
            storage_timeout = %humantime::format_duration(cfg.storage_timeout),
            "Initializing {} module",
            Self::MODULE_NAME
        );

        let svc = Arc::new(Service::new(cfg, store));
        self.service
            .set(Arc::clone(&svc))
            .map_err(|_| anyhow::anyhow!("{} module already initialized", Self::MODULE_NAME))?;

        let api: Arc<dyn PermissionsClient> = Arc::new(PermissionsLocalClient::new(svc));

        info!("{} module initialized successfully", Self::MODULE_NAME);
        Ok(api)
    }

    /// The domain service, once initialized.
    #[must_use]
    pub fn service(&self) -> Option<Arc<Service>> {
        self.service.get().cloned()
    }
}
