//! Domain service for the permissions module.

use std::sync::Arc;

use permissions_sdk::PermissionStore;

use super::cache::PermissionGraphCache;
use super::context::PermissionsContext;
use super::error::DomainError;
use super::guard::GuardRegistry;
use super::membership::MembershipIndex;
use super::registry::IdentityRegistry;
use super::resolver::Resolver;
use super::storage::Storage;
use crate::config::PermissionsConfig;

/// Permissions service: the registry, membership index and resolver over one
/// shared store, guard registry and graph cache.
pub struct Service {
    ctx: Arc<PermissionsContext>,
    registry: Arc<IdentityRegistry>,
    membership: Arc<MembershipIndex>,
    resolver: Resolver,
}

impl Service {
    #[must_use]
    pub fn new(cfg: &PermissionsConfig, store: Arc<dyn PermissionStore>) -> Self {
        let ctx = Arc::new(PermissionsContext {
            storage: Storage::new(store, cfg.storage_timeout),
            cache: PermissionGraphCache::new(cfg.cache_ttl),
            guards: GuardRegistry::from_config(cfg),
            owner_role: cfg.owner_role.clone(),
        });
        let registry = Arc::new(IdentityRegistry::new(Arc::clone(&ctx)));
        let membership = Arc::new(MembershipIndex::new(
            Arc::clone(&ctx),
            Arc::clone(&registry),
        ));
        let resolver = Resolver::new(
            Arc::clone(&ctx),
            Arc::clone(&registry),
            Arc::clone(&membership),
        );

        Self {
            ctx,
            registry,
            membership,
            resolver,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    #[must_use]
    pub fn membership(&self) -> &MembershipIndex {
        &self.membership
    }

    #[must_use]
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    #[must_use]
    pub fn cache(&self) -> &PermissionGraphCache {
        &self.ctx.cache
    }

    #[must_use]
    pub fn guards(&self) -> &GuardRegistry {
        &self.ctx.guards
    }
}

/// Collapse a check result into a decision. Errors deny.
#[must_use]
pub fn deny_on_error(operation: &'static str, result: Result<bool, DomainError>) -> bool {
    match result {
        Ok(granted) => granted,
        Err(e) => {
            tracing::warn!(operation, error = %e, "Authorization check failed, denying");
            false
        }
    }
}
