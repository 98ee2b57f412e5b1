//! Authorization queries over the registry and membership index.

use std::collections::BTreeSet;
use std::sync::Arc;

use permissions_sdk::{GroupId, GroupNames, PermissionRef, Principal, PrincipalKey, ScopeId};
use tracing::debug;

use super::context::{PermissionsContext, found, scope_applies};
use super::error::DomainError;
use super::membership::MembershipIndex;
use super::registry::IdentityRegistry;

pub struct Resolver {
    ctx: Arc<PermissionsContext>,
    registry: Arc<IdentityRegistry>,
    membership: Arc<MembershipIndex>,
}

impl Resolver {
    #[must_use]
    pub fn new(
        ctx: Arc<PermissionsContext>,
        registry: Arc<IdentityRegistry>,
        membership: Arc<MembershipIndex>,
    ) -> Self {
        Self {
            ctx,
            registry,
            membership,
        }
    }

    /// Whether the principal holds the permission directly, through a group
    /// it joined, or through a grant on one of its memberships.
    ///
    /// Grants and memberships are filtered by scope exactly like
    /// [`MembershipIndex::groups_of`]: an unscoped query sees every scope.
    /// A missing reference, an unknown name and a permission of a foreign
    /// guard all give `false`. Groups do not nest.
    ///
    /// # Errors
    ///
    /// Storage errors only; callers turn them into a denial.
    #[tracing::instrument(skip_all, fields(principal = %principal.principal_id()))]
    pub async fn has_permission(
        &self,
        principal: &dyn Principal,
        permission: Option<&PermissionRef>,
        scope: Option<ScopeId>,
    ) -> Result<bool, DomainError> {
        let Some(reference) = permission else {
            return Ok(false);
        };

        let graph = self.ctx.graph().await?;
        let guard = self.ctx.guards.default_guard_for(principal);
        let Some(permission) = graph.find_permission(reference, &guard, scope) else {
            debug!(permission = %reference.describe(), %guard, "Unknown permission, denying");
            return Ok(false);
        };
        if self.ctx.guards.ensure_shared(principal, &permission.guard).is_err() {
            debug!(permission_id = %permission.id, "Permission in a foreign guard, denying");
            return Ok(false);
        }

        let key = principal.key();
        let grants = self.membership.direct_grants(&key).await?;
        if grants
            .iter()
            .any(|g| g.permission_id == permission.id && scope_applies(g.scope, scope))
        {
            return Ok(true);
        }

        let memberships = self.membership.memberships(&key).await?;
        Ok(memberships
            .iter()
            .filter(|m| scope_applies(m.scope, scope))
            .any(|m| {
                m.permissions.contains(&permission.id)
                    || graph.group_has_permission(m.group_id, permission.id)
            }))
    }

    /// # Errors
    ///
    /// Storage errors only.
    pub async fn can(&self, principal: &dyn Principal, ability: &str) -> Result<bool, DomainError> {
        let reference = PermissionRef::from(ability);
        self.has_permission(principal, Some(&reference), None).await
    }

    /// Whether the principal joined, or owns, at least one named group.
    ///
    /// # Errors
    ///
    /// Storage errors only.
    pub async fn is_member_of_any(
        &self,
        principal: &dyn Principal,
        groups: &GroupNames,
    ) -> Result<bool, DomainError> {
        if groups.is_empty() {
            return Ok(false);
        }

        let joined = self.joined_group_names(principal).await?;
        if groups.iter().any(|name| joined.contains(name)) {
            return Ok(true);
        }

        let graph = self.ctx.graph().await?;
        let owner = principal.principal_id();
        let guards = self.ctx.guards.guards_for(principal);
        Ok(groups.iter().any(|name| {
            guards.iter().any(|guard| {
                graph
                    .group_by_name(name, guard)
                    .is_some_and(|g| g.is_owned_by(owner))
            })
        }))
    }

    /// Whether the principal joined every named group. Ownership does not
    /// count. An empty list is always satisfied.
    ///
    /// # Errors
    ///
    /// Storage errors only.
    pub async fn is_member_of_all(
        &self,
        principal: &dyn Principal,
        groups: &GroupNames,
    ) -> Result<bool, DomainError> {
        let joined = self.joined_group_names(principal).await?;
        Ok(groups.iter().all(|name| joined.contains(name)))
    }

    /// Principals holding the permission in any scope, sorted and without
    /// duplicates. Unknown permissions give an empty list.
    ///
    /// # Errors
    ///
    /// Storage errors only.
    #[tracing::instrument(skip_all, fields(permission = %permission.describe()))]
    pub async fn principals_with_permission(
        &self,
        permission: &PermissionRef,
        guard: Option<&str>,
    ) -> Result<Vec<PrincipalKey>, DomainError> {
        let graph = self.ctx.graph().await?;
        let Some(permission) = found(self.registry.lookup_permission(&graph, permission, guard))?
        else {
            return Ok(Vec::new());
        };

        let storage = &self.ctx.storage;
        let mut holders: BTreeSet<PrincipalKey> = BTreeSet::new();
        holders.extend(
            storage
                .with_timeout("direct_holders", storage.store().direct_holders(permission.id))
                .await?,
        );

        let groups: Vec<GroupId> = graph.groups_with(permission.id).collect();
        for group_id in groups {
            holders.extend(
                storage
                    .with_timeout("members_of", storage.store().members_of(group_id))
                    .await?,
            );
        }

        holders.extend(
            storage
                .with_timeout(
                    "membership_grant_holders",
                    storage.store().membership_grant_holders(permission.id),
                )
                .await?,
        );

        Ok(holders.into_iter().collect())
    }

    async fn joined_group_names(
        &self,
        principal: &dyn Principal,
    ) -> Result<BTreeSet<String>, DomainError> {
        Ok(self
            .membership
            .groups_of(principal, None)
            .await?
            .into_iter()
            .map(|g| g.name)
            .collect())
    }
}
