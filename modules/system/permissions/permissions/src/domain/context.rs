//! State shared by the registry, membership index and resolver.

use std::sync::Arc;

use permissions_sdk::{Group, GroupRef, Permission, PermissionRef, Principal, ScopeId};

use super::cache::{PermissionGraph, PermissionGraphCache};
use super::error::DomainError;
use super::guard::GuardRegistry;
use super::storage::Storage;

pub struct PermissionsContext {
    pub storage: Storage,
    pub cache: PermissionGraphCache,
    pub guards: GuardRegistry,
    pub owner_role: String,
}

impl PermissionsContext {
    /// Current permission graph, rebuilt from storage on a miss.
    ///
    /// # Errors
    ///
    /// Propagates storage errors from the snapshot load.
    pub async fn graph(&self) -> Result<Arc<PermissionGraph>, DomainError> {
        self.cache
            .get_or_build(move || async move {
                let snapshot = self
                    .storage
                    .with_timeout("load_snapshot", self.storage.store().load_snapshot())
                    .await?;
                Ok(PermissionGraph::from_snapshot(snapshot))
            })
            .await
    }

    /// Resolve a permission reference against the graph.
    ///
    /// Names are looked up in `guard`. References by id may land in any
    /// guard; callers check the guard afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::PermissionNotFound`] on a miss.
    pub fn permission(
        graph: &PermissionGraph,
        reference: &PermissionRef,
        guard: &str,
        scope: Option<ScopeId>,
    ) -> Result<Permission, DomainError> {
        graph
            .find_permission(reference, guard, scope)
            .cloned()
            .ok_or_else(|| DomainError::permission_not_found(reference.describe()))
    }

    /// # Errors
    ///
    /// Returns [`DomainError::GroupNotFound`] on a miss.
    pub fn group(
        graph: &PermissionGraph,
        reference: &GroupRef,
        guard: &str,
    ) -> Result<Group, DomainError> {
        graph
            .find_group(reference, guard)
            .cloned()
            .ok_or_else(|| DomainError::group_not_found(reference.describe()))
    }

    /// Resolve a permission on behalf of a principal and check that it lives
    /// in one of the principal's guards.
    ///
    /// # Errors
    ///
    /// `PermissionNotFound` on a miss, `GuardMismatch` on a foreign guard.
    pub fn permission_for(
        &self,
        graph: &PermissionGraph,
        principal: &dyn Principal,
        reference: &PermissionRef,
        scope: Option<ScopeId>,
    ) -> Result<Permission, DomainError> {
        let guard = self.guards.default_guard_for(principal);
        let permission = Self::permission(graph, reference, &guard, scope)?;
        self.guards.ensure_shared(principal, &permission.guard)?;
        Ok(permission)
    }

    /// Resolve a group on behalf of a principal and check its guard.
    ///
    /// # Errors
    ///
    /// `GroupNotFound` on a miss, `GuardMismatch` on a foreign guard.
    pub fn group_for(
        &self,
        graph: &PermissionGraph,
        principal: &dyn Principal,
        reference: &GroupRef,
    ) -> Result<Group, DomainError> {
        let guard = self.guards.default_guard_for(principal);
        let group = Self::group(graph, reference, &guard)?;
        self.guards.ensure_shared(principal, &group.guard)?;
        Ok(group)
    }
}

/// A grant or membership applies to a query when either side is unscoped or
/// both name the same scope.
pub(crate) fn scope_applies(granted: Option<ScopeId>, queried: Option<ScopeId>) -> bool {
    queried.is_none() || granted.is_none() || granted == queried
}

/// Turn a lookup miss (unknown name or foreign guard) into `None`.
///
/// Queries use this to degrade to "not granted" while still surfacing
/// storage failures.
pub(crate) fn found<T>(result: Result<T, DomainError>) -> Result<Option<T>, DomainError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(
            DomainError::PermissionNotFound { .. }
            | DomainError::GroupNotFound { .. }
            | DomainError::GuardMismatch { .. },
        ) => Ok(None),
        Err(e) => Err(e),
    }
}
