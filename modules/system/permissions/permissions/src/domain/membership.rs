//! Membership index: per-principal direct grants, group memberships and the
//! current-group pointer.

use std::sync::Arc;

use permissions_sdk::{
    DirectGrant, Group, GroupId, GroupRef, Membership, NewGroup, Permission, PermissionRef,
    Principal, PrincipalKey, ScopeId,
};
use tracing::{debug, info};

use super::context::{PermissionsContext, found, scope_applies};
use super::error::DomainError;
use super::registry::IdentityRegistry;

pub struct MembershipIndex {
    ctx: Arc<PermissionsContext>,
    registry: Arc<IdentityRegistry>,
}

impl MembershipIndex {
    #[must_use]
    pub fn new(ctx: Arc<PermissionsContext>, registry: Arc<IdentityRegistry>) -> Self {
        Self { ctx, registry }
    }

    /// Grant a permission directly. Granting twice is a no-op.
    ///
    /// # Errors
    ///
    /// - [`DomainError::PermissionNotFound`] on a miss
    /// - [`DomainError::GuardMismatch`] if the permission is in a foreign guard
    /// - Storage errors
    #[tracing::instrument(skip_all, fields(principal = %principal.principal_id(), permission = %permission.describe()))]
    pub async fn grant_permission(
        &self,
        principal: &dyn Principal,
        permission: &PermissionRef,
        scope: Option<ScopeId>,
    ) -> Result<(), DomainError> {
        let graph = self.ctx.graph().await?;
        let permission = self.ctx.permission_for(&graph, principal, permission, scope)?;
        let grant = DirectGrant {
            permission_id: permission.id,
            scope,
        };

        let storage = &self.ctx.storage;
        let added = storage
            .with_timeout(
                "add_direct_grant",
                storage.store().add_direct_grant(&principal.key(), grant),
            )
            .await?;

        if added {
            self.ctx.cache.invalidate();
            info!(permission_id = %permission.id, scoped = scope.is_some(), "Granted permission");
        }
        Ok(())
    }

    /// Revoke a direct grant. Revoking an absent grant is a no-op.
    ///
    /// # Errors
    ///
    /// - [`DomainError::PermissionNotFound`] on a miss
    /// - Storage errors
    #[tracing::instrument(skip_all, fields(principal = %principal.principal_id(), permission = %permission.describe()))]
    pub async fn revoke_permission(
        &self,
        principal: &dyn Principal,
        permission: &PermissionRef,
        scope: Option<ScopeId>,
    ) -> Result<(), DomainError> {
        let graph = self.ctx.graph().await?;
        let guard = self.ctx.guards.default_guard_for(principal);
        let permission = PermissionsContext::permission(&graph, permission, &guard, scope)?;
        let grant = DirectGrant {
            permission_id: permission.id,
            scope,
        };

        let storage = &self.ctx.storage;
        let removed = storage
            .with_timeout(
                "remove_direct_grant",
                storage.store().remove_direct_grant(&principal.key(), grant),
            )
            .await?;

        if removed {
            self.ctx.cache.invalidate();
            info!(permission_id = %permission.id, "Revoked permission");
        }
        Ok(())
    }

    /// Replace every direct grant with the given unscoped set.
    ///
    /// # Errors
    ///
    /// - `PermissionNotFound` / `GuardMismatch` for any reference; nothing is changed
    /// - Storage errors
    #[tracing::instrument(skip_all, fields(principal = %principal.principal_id(), count = permissions.len()))]
    pub async fn sync_permissions(
        &self,
        principal: &dyn Principal,
        permissions: &[PermissionRef],
    ) -> Result<(), DomainError> {
        let graph = self.ctx.graph().await?;

        let mut grants: Vec<DirectGrant> = Vec::with_capacity(permissions.len());
        for reference in permissions {
            let permission = self.ctx.permission_for(&graph, principal, reference, None)?;
            let grant = DirectGrant {
                permission_id: permission.id,
                scope: None,
            };
            if !grants.contains(&grant) {
                grants.push(grant);
            }
        }

        let count = grants.len();
        let storage = &self.ctx.storage;
        storage
            .with_timeout(
                "replace_direct_grants",
                storage.store().replace_direct_grants(&principal.key(), grants),
            )
            .await?;
        self.ctx.cache.invalidate();

        info!(permissions = count, "Synced direct permissions");
        Ok(())
    }

    /// Join a group. Joining a group twice keeps the first membership.
    ///
    /// # Errors
    ///
    /// - [`DomainError::GroupNotFound`] on a miss
    /// - [`DomainError::GuardMismatch`] if the group is in a foreign guard
    /// - Storage errors
    #[tracing::instrument(skip_all, fields(principal = %principal.principal_id(), group = %group.describe()))]
    pub async fn join_group(
        &self,
        principal: &dyn Principal,
        group: &GroupRef,
        role: Option<String>,
        scope: Option<ScopeId>,
    ) -> Result<Group, DomainError> {
        let graph = self.ctx.graph().await?;
        let group = self.ctx.group_for(&graph, principal, group)?;

        let storage = &self.ctx.storage;
        let added = storage
            .with_timeout(
                "add_membership",
                storage
                    .store()
                    .add_membership(&principal.key(), Membership::new(group.id, role, scope)),
            )
            .await?;

        if added {
            self.ctx.cache.invalidate();
            info!(group_id = %group.id, scoped = scope.is_some(), "Joined group");
        }
        Ok(group)
    }

    /// Leave a group. Leaving a group the principal is not in is a no-op.
    ///
    /// # Errors
    ///
    /// - [`DomainError::GroupNotFound`] on a miss
    /// - [`DomainError::GuardMismatch`] if the group is in a foreign guard
    /// - Storage errors
    #[tracing::instrument(skip_all, fields(principal = %principal.principal_id(), group = %group.describe()))]
    pub async fn leave_group(
        &self,
        principal: &dyn Principal,
        group: &GroupRef,
    ) -> Result<(), DomainError> {
        let graph = self.ctx.graph().await?;
        let group = self.ctx.group_for(&graph, principal, group)?;

        let storage = &self.ctx.storage;
        let removed = storage
            .with_timeout(
                "remove_membership",
                storage.store().remove_membership(&principal.key(), group.id),
            )
            .await?;

        if removed {
            self.ctx.cache.invalidate();
            info!(group_id = %group.id, "Left group");
        }
        Ok(())
    }

    /// Replace every membership with the given groups. Memberships kept
    /// across the sync retain their role, scope and grants.
    ///
    /// # Errors
    ///
    /// - `GroupNotFound` / `GuardMismatch` for any reference; nothing is changed
    /// - Storage errors
    #[tracing::instrument(skip_all, fields(principal = %principal.principal_id(), count = groups.len()))]
    pub async fn sync_groups(
        &self,
        principal: &dyn Principal,
        groups: &[GroupRef],
    ) -> Result<(), DomainError> {
        let graph = self.ctx.graph().await?;

        let mut group_ids: Vec<GroupId> = Vec::with_capacity(groups.len());
        for reference in groups {
            let group = self.ctx.group_for(&graph, principal, reference)?;
            if !group_ids.contains(&group.id) {
                group_ids.push(group.id);
            }
        }

        let key = principal.key();
        let mut existing = self.memberships(&key).await?;
        let memberships: Vec<Membership> = group_ids
            .into_iter()
            .map(|group_id| {
                existing
                    .iter()
                    .position(|m| m.group_id == group_id)
                    .map_or_else(|| Membership::new(group_id, None, None), |i| existing.swap_remove(i))
            })
            .collect();

        let count = memberships.len();
        let storage = &self.ctx.storage;
        storage
            .with_timeout(
                "replace_memberships",
                storage.store().replace_memberships(&key, memberships),
            )
            .await?;
        self.ctx.cache.invalidate();

        info!(groups = count, "Synced group memberships");
        Ok(())
    }

    /// Permissions granted directly, in any scope, without duplicates.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn direct_permissions_of(
        &self,
        principal: &dyn Principal,
    ) -> Result<Vec<Permission>, DomainError> {
        let grants = self.direct_grants(&principal.key()).await?;
        let graph = self.ctx.graph().await?;

        let mut permissions: Vec<Permission> = Vec::with_capacity(grants.len());
        for grant in grants {
            if let Some(permission) = graph.permission(grant.permission_id)
                && !permissions.iter().any(|p| p.id == permission.id)
            {
                permissions.push(permission.clone());
            }
        }
        Ok(permissions)
    }

    /// Groups in join order. With a scope, only memberships that are
    /// unscoped or in that scope are listed.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn groups_of(
        &self,
        principal: &dyn Principal,
        scope: Option<ScopeId>,
    ) -> Result<Vec<Group>, DomainError> {
        let memberships = self.memberships(&principal.key()).await?;
        let graph = self.ctx.graph().await?;

        Ok(memberships
            .iter()
            .filter(|m| scope_applies(m.scope, scope))
            .filter_map(|m| graph.group(m.group_id).cloned())
            .collect())
    }

    /// The current group, defaulting to the first joined group.
    ///
    /// When the pointer is unset or targets a group the principal has left,
    /// the first joined group is chosen and persisted.
    ///
    /// # Errors
    ///
    /// Storage errors.
    #[tracing::instrument(skip_all, fields(principal = %principal.principal_id()))]
    pub async fn current_group_of(
        &self,
        principal: &dyn Principal,
    ) -> Result<Option<Group>, DomainError> {
        let key = principal.key();
        let memberships = self.memberships(&key).await?;
        if memberships.is_empty() {
            return Ok(None);
        }

        let graph = self.ctx.graph().await?;
        let storage = &self.ctx.storage;
        let pointer = storage
            .with_timeout("current_group", storage.store().current_group(&key))
            .await?;

        if let Some(group_id) = pointer
            && memberships.iter().any(|m| m.group_id == group_id)
            && let Some(group) = graph.group(group_id)
        {
            return Ok(Some(group.clone()));
        }

        let Some(first) = memberships.iter().find_map(|m| graph.group(m.group_id)) else {
            return Ok(None);
        };

        storage
            .with_timeout(
                "set_current_group",
                storage.store().set_current_group(&key, Some(first.id)),
            )
            .await?;

        debug!(group_id = %first.id, stale = pointer.is_some(), "Defaulted current group");
        Ok(Some(first.clone()))
    }

    /// # Errors
    ///
    /// Storage errors.
    pub async fn current_group_name(
        &self,
        principal: &dyn Principal,
    ) -> Result<Option<String>, DomainError> {
        Ok(self.current_group_of(principal).await?.map(|g| g.name))
    }

    /// Point the current group at a group the principal belongs to.
    ///
    /// # Errors
    ///
    /// - [`DomainError::GroupNotFound`] on a miss
    /// - [`DomainError::NotAMember`] if the principal is not in the group
    /// - Storage errors
    #[tracing::instrument(skip_all, fields(principal = %principal.principal_id(), group = %group.describe()))]
    pub async fn switch_current_group(
        &self,
        principal: &dyn Principal,
        group: &GroupRef,
    ) -> Result<Group, DomainError> {
        let graph = self.ctx.graph().await?;
        let guard = self.ctx.guards.default_guard_for(principal);
        let group = PermissionsContext::group(&graph, group, &guard)?;

        let key = principal.key();
        self.ensure_member(&key, &group).await?;

        let storage = &self.ctx.storage;
        storage
            .with_timeout(
                "set_current_group",
                storage.store().set_current_group(&key, Some(group.id)),
            )
            .await?;

        info!(group_id = %group.id, "Switched current group");
        Ok(group)
    }

    /// Clear the pointer and derive the default again.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn refresh_current_group(
        &self,
        principal: &dyn Principal,
    ) -> Result<Option<Group>, DomainError> {
        let storage = &self.ctx.storage;
        storage
            .with_timeout(
                "set_current_group",
                storage.store().set_current_group(&principal.key(), None),
            )
            .await?;

        self.current_group_of(principal).await
    }

    /// Create a team owned by the principal in its default guard, join it
    /// with the owner role and make it the current group.
    ///
    /// The three store writes are not transactional. If joining or moving the
    /// pointer fails the team stays behind; calling again with the same name
    /// picks up the team the principal already owns and finishes the setup.
    ///
    /// # Errors
    ///
    /// - [`DomainError::GroupAlreadyExists`] if the name is taken by a group
    ///   the principal does not own
    /// - Storage errors
    #[tracing::instrument(skip_all, fields(principal = %principal.principal_id(), name = %name))]
    pub async fn create_owned_group(
        &self,
        principal: &dyn Principal,
        name: &str,
    ) -> Result<Group, DomainError> {
        let guard = self.ctx.guards.default_guard_for(principal);
        let owner = principal.principal_id();
        let group = match self
            .registry
            .create_group(NewGroup::new(name).guard(guard.as_str()).owner(owner))
            .await
        {
            Ok(group) => group,
            Err(e @ DomainError::GroupAlreadyExists { .. }) => {
                self.ctx.cache.invalidate();
                let existing = self
                    .registry
                    .find_group(&GroupRef::ByName(name.to_owned()), Some(&guard))
                    .await?;
                if !existing.is_owned_by(owner) {
                    return Err(e);
                }
                debug!(group_id = %existing.id, "Resuming setup of owned group");
                existing
            }
            Err(e) => return Err(e),
        };

        let key = principal.key();
        let storage = &self.ctx.storage;
        let membership = Membership::new(group.id, Some(self.ctx.owner_role.clone()), None);
        storage
            .with_timeout(
                "add_membership",
                storage.store().add_membership(&key, membership),
            )
            .await?;
        storage
            .with_timeout(
                "set_current_group",
                storage.store().set_current_group(&key, Some(group.id)),
            )
            .await?;
        self.ctx.cache.invalidate();

        info!(group_id = %group.id, "Created owned group");
        Ok(group)
    }

    /// Grant a permission on one membership only.
    ///
    /// # Errors
    ///
    /// - `GroupNotFound` / `PermissionNotFound` on a miss
    /// - [`DomainError::GuardMismatch`] if either lives in a foreign guard
    /// - [`DomainError::NotAMember`] if the principal is not in the group
    /// - Storage errors
    #[tracing::instrument(skip_all, fields(principal = %principal.principal_id(), group = %group.describe(), permission = %permission.describe()))]
    pub async fn grant_permission_on_group(
        &self,
        principal: &dyn Principal,
        group: &GroupRef,
        permission: &PermissionRef,
    ) -> Result<(), DomainError> {
        let graph = self.ctx.graph().await?;
        let group = self.ctx.group_for(&graph, principal, group)?;
        let permission = self.ctx.permission_for(&graph, principal, permission, None)?;

        let key = principal.key();
        self.ensure_member(&key, &group).await?;

        let storage = &self.ctx.storage;
        let added = storage
            .with_timeout(
                "add_membership_grant",
                storage
                    .store()
                    .add_membership_grant(&key, group.id, permission.id),
            )
            .await?;

        if added {
            self.ctx.cache.invalidate();
            info!(group_id = %group.id, permission_id = %permission.id, "Granted permission on group");
        }
        Ok(())
    }

    /// # Errors
    ///
    /// - `GroupNotFound` / `PermissionNotFound` on a miss
    /// - [`DomainError::NotAMember`] if the principal is not in the group
    /// - Storage errors
    pub async fn revoke_permission_on_group(
        &self,
        principal: &dyn Principal,
        group: &GroupRef,
        permission: &PermissionRef,
    ) -> Result<(), DomainError> {
        let graph = self.ctx.graph().await?;
        let guard = self.ctx.guards.default_guard_for(principal);
        let group = PermissionsContext::group(&graph, group, &guard)?;
        let permission = PermissionsContext::permission(&graph, permission, &group.guard, None)?;

        let key = principal.key();
        self.ensure_member(&key, &group).await?;

        let storage = &self.ctx.storage;
        let removed = storage
            .with_timeout(
                "remove_membership_grant",
                storage
                    .store()
                    .remove_membership_grant(&key, group.id, permission.id),
            )
            .await?;

        if removed {
            self.ctx.cache.invalidate();
            info!(group_id = %group.id, permission_id = %permission.id, "Revoked permission on group");
        }
        Ok(())
    }

    /// Role label within the group. `None` if the group is unknown or the
    /// principal is not a member.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn role_on(
        &self,
        principal: &dyn Principal,
        group: &GroupRef,
    ) -> Result<Option<String>, DomainError> {
        let graph = self.ctx.graph().await?;
        let Some(group) = found(self.ctx.group_for(&graph, principal, group))? else {
            return Ok(None);
        };

        let memberships = self.memberships(&principal.key()).await?;
        Ok(memberships
            .into_iter()
            .find(|m| m.group_id == group.id)
            .and_then(|m| m.role))
    }

    /// # Errors
    ///
    /// Storage errors.
    pub async fn has_role_on(
        &self,
        principal: &dyn Principal,
        group: &GroupRef,
        role: &str,
    ) -> Result<bool, DomainError> {
        Ok(self.role_on(principal, group).await?.as_deref() == Some(role))
    }

    /// # Errors
    ///
    /// Storage errors.
    pub async fn belongs_to_any_group(&self, principal: &dyn Principal) -> Result<bool, DomainError> {
        Ok(!self.memberships(&principal.key()).await?.is_empty())
    }

    /// Principals that joined the group. Unknown groups give an empty list.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn members_of(
        &self,
        group: &GroupRef,
        guard: Option<&str>,
    ) -> Result<Vec<PrincipalKey>, DomainError> {
        let graph = self.ctx.graph().await?;
        let Some(group) = found(self.registry.lookup_group(&graph, group, guard))? else {
            return Ok(Vec::new());
        };

        let storage = &self.ctx.storage;
        storage
            .with_timeout("members_of", storage.store().members_of(group.id))
            .await
    }

    pub(crate) async fn memberships(
        &self,
        key: &PrincipalKey,
    ) -> Result<Vec<Membership>, DomainError> {
        let storage = &self.ctx.storage;
        storage
            .with_timeout("memberships", storage.store().memberships(key))
            .await
    }

    pub(crate) async fn direct_grants(
        &self,
        key: &PrincipalKey,
    ) -> Result<Vec<DirectGrant>, DomainError> {
        let storage = &self.ctx.storage;
        storage
            .with_timeout("direct_grants", storage.store().direct_grants(key))
            .await
    }

    async fn ensure_member(&self, key: &PrincipalKey, group: &Group) -> Result<(), DomainError> {
        let memberships = self.memberships(key).await?;
        if memberships.iter().any(|m| m.group_id == group.id) {
            Ok(())
        } else {
            Err(DomainError::NotAMember {
                group: group.name.clone(),
            })
        }
    }
}
