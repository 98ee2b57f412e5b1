//! Identity registry: permissions, groups, and which groups carry which permissions.

use std::sync::Arc;

use chrono::Utc;
use permissions_sdk::{
    Group, GroupRef, NewGroup, NewPermission, Permission, PermissionId, PermissionRef, ScopeId,
    StoreError,
};
use tracing::info;
use uuid::Uuid;

use super::cache::PermissionGraph;
use super::context::PermissionsContext;
use super::error::DomainError;

pub struct IdentityRegistry {
    ctx: Arc<PermissionsContext>,
}

impl IdentityRegistry {
    #[must_use]
    pub fn new(ctx: Arc<PermissionsContext>) -> Self {
        Self { ctx }
    }

    /// Create a permission in the given guard, or the default one.
    ///
    /// # Errors
    ///
    /// - [`DomainError::PermissionAlreadyExists`] on a duplicate `(name, guard, scope)`
    /// - Storage errors
    #[tracing::instrument(skip_all, fields(name = %new.name))]
    pub async fn create_permission(&self, new: NewPermission) -> Result<Permission, DomainError> {
        let guard = self.ctx.guards.resolve(new.guard.as_deref());
        let permission = Permission {
            id: Uuid::new_v4(),
            name: new.name,
            guard,
            scope: new.scope,
            created_at: Utc::now(),
        };
        let (name, guard, scope) = (
            permission.name.clone(),
            permission.guard.clone(),
            permission.scope,
        );

        let created = self
            .ctx
            .storage
            .with_timeout(
                "insert_permission",
                self.ctx.storage.store().insert_permission(permission),
            )
            .await
            .map_err(|e| match e {
                DomainError::Storage(StoreError::Conflict(_)) => {
                    DomainError::PermissionAlreadyExists { name, guard, scope }
                }
                other => other,
            })?;
        self.ctx.cache.invalidate();

        info!(
            permission_id = %created.id,
            guard = %created.guard,
            scoped = created.scope.is_some(),
            "Created permission"
        );
        Ok(created)
    }

    /// Find a permission by reference. Names are looked up unscoped in the
    /// given guard (or the default guard); with an explicit guard, a
    /// permission of another guard is reported as missing.
    ///
    /// # Errors
    ///
    /// - [`DomainError::PermissionNotFound`] on a miss
    pub async fn find_permission(
        &self,
        reference: &PermissionRef,
        guard: Option<&str>,
    ) -> Result<Permission, DomainError> {
        let graph = self.ctx.graph().await?;
        self.lookup_permission(&graph, reference, guard)
    }

    /// Exact `(name, guard, scope)` lookup.
    ///
    /// # Errors
    ///
    /// - [`DomainError::PermissionNotFound`] on a miss
    pub async fn find_scoped_permission(
        &self,
        name: &str,
        guard: Option<&str>,
        scope: Option<ScopeId>,
    ) -> Result<Permission, DomainError> {
        let guard = self.ctx.guards.resolve(guard);
        let graph = self.ctx.graph().await?;
        graph
            .permission_by_name(name, &guard, scope)
            .cloned()
            .ok_or_else(|| DomainError::permission_not_found(name))
    }

    /// # Errors
    ///
    /// Storage errors only.
    pub async fn find_or_create_permission(
        &self,
        new: NewPermission,
    ) -> Result<Permission, DomainError> {
        let guard = self.ctx.guards.resolve(new.guard.as_deref());
        let (name, scope) = (new.name.clone(), new.scope);

        if let Ok(existing) = self
            .find_scoped_permission(&name, Some(&guard), scope)
            .await
        {
            return Ok(existing);
        }

        match self.create_permission(new).await {
            // Created concurrently by someone else; our graph is stale
            Err(DomainError::PermissionAlreadyExists { .. }) => {
                self.ctx.cache.invalidate();
                self.find_scoped_permission(&name, Some(&guard), scope).await
            }
            other => other,
        }
    }

    /// Delete a permission. The store drops every grant referencing it.
    ///
    /// # Errors
    ///
    /// - [`DomainError::PermissionNotFound`] if it does not exist
    /// - Storage errors
    #[tracing::instrument(skip_all, fields(permission = %reference.describe()))]
    pub async fn delete_permission(
        &self,
        reference: &PermissionRef,
        guard: Option<&str>,
    ) -> Result<(), DomainError> {
        let graph = self.ctx.graph().await?;
        let permission = self.lookup_permission(&graph, reference, guard)?;

        let deleted = self
            .ctx
            .storage
            .with_timeout(
                "delete_permission",
                self.ctx.storage.store().delete_permission(permission.id),
            )
            .await?;
        self.ctx.cache.invalidate();

        if !deleted {
            return Err(DomainError::permission_not_found(reference.describe()));
        }
        info!(permission_id = %permission.id, guard = %permission.guard, "Deleted permission");
        Ok(())
    }

    /// Create a group in the given guard, or the default one.
    ///
    /// # Errors
    ///
    /// - [`DomainError::GroupAlreadyExists`] on a duplicate name within the guard
    /// - Storage errors
    #[tracing::instrument(skip_all, fields(name = %new.name))]
    pub async fn create_group(&self, new: NewGroup) -> Result<Group, DomainError> {
        let guard = self.ctx.guards.resolve(new.guard.as_deref());
        let group = Group {
            id: Uuid::new_v4(),
            name: new.name,
            guard,
            owner_id: new.owner_id,
            created_at: Utc::now(),
        };
        let (name, guard) = (group.name.clone(), group.guard.clone());

        let created = self
            .ctx
            .storage
            .with_timeout("insert_group", self.ctx.storage.store().insert_group(group))
            .await
            .map_err(|e| match e {
                DomainError::Storage(StoreError::Conflict(_)) => {
                    DomainError::GroupAlreadyExists { name, guard }
                }
                other => other,
            })?;
        self.ctx.cache.invalidate();

        info!(
            group_id = %created.id,
            guard = %created.guard,
            team = created.is_team(),
            "Created group"
        );
        Ok(created)
    }

    /// # Errors
    ///
    /// - [`DomainError::GroupNotFound`] on a miss
    pub async fn find_group(
        &self,
        reference: &GroupRef,
        guard: Option<&str>,
    ) -> Result<Group, DomainError> {
        let graph = self.ctx.graph().await?;
        self.lookup_group(&graph, reference, guard)
    }

    /// # Errors
    ///
    /// Storage errors only.
    pub async fn find_or_create_group(&self, new: NewGroup) -> Result<Group, DomainError> {
        let guard = self.ctx.guards.resolve(new.guard.as_deref());
        let reference = GroupRef::ByName(new.name.clone());

        if let Ok(existing) = self.find_group(&reference, Some(&guard)).await {
            return Ok(existing);
        }

        match self.create_group(new).await {
            Err(DomainError::GroupAlreadyExists { .. }) => {
                self.ctx.cache.invalidate();
                self.find_group(&reference, Some(&guard)).await
            }
            other => other,
        }
    }

    /// Delete a group. The store drops its permission edges, its memberships
    /// and any current-group pointer targeting it.
    ///
    /// # Errors
    ///
    /// - [`DomainError::GroupNotFound`] if it does not exist
    /// - Storage errors
    #[tracing::instrument(skip_all, fields(group = %reference.describe()))]
    pub async fn delete_group(
        &self,
        reference: &GroupRef,
        guard: Option<&str>,
    ) -> Result<(), DomainError> {
        let graph = self.ctx.graph().await?;
        let group = self.lookup_group(&graph, reference, guard)?;

        let deleted = self
            .ctx
            .storage
            .with_timeout("delete_group", self.ctx.storage.store().delete_group(group.id))
            .await?;
        self.ctx.cache.invalidate();

        if !deleted {
            return Err(DomainError::group_not_found(reference.describe()));
        }
        info!(group_id = %group.id, guard = %group.guard, "Deleted group");
        Ok(())
    }

    /// # Errors
    ///
    /// - `GroupNotFound` / `PermissionNotFound` on a miss
    /// - [`DomainError::GuardMismatch`] if the guards differ
    /// - Storage errors
    #[tracing::instrument(skip_all, fields(group = %group.describe(), permission = %permission.describe()))]
    pub async fn attach_permission_to_group(
        &self,
        group: &GroupRef,
        permission: &PermissionRef,
        guard: Option<&str>,
    ) -> Result<(), DomainError> {
        let graph = self.ctx.graph().await?;
        let (group, permission) = self.group_and_permission(&graph, group, permission, guard)?;

        let attached = self
            .ctx
            .storage
            .with_timeout(
                "attach_group_permission",
                self.ctx
                    .storage
                    .store()
                    .attach_group_permission(group.id, permission.id),
            )
            .await?;

        if attached {
            self.ctx.cache.invalidate();
            info!(group_id = %group.id, permission_id = %permission.id, "Attached permission to group");
        }
        Ok(())
    }

    /// # Errors
    ///
    /// - `GroupNotFound` / `PermissionNotFound` on a miss
    /// - [`DomainError::GuardMismatch`] if the guards differ
    /// - Storage errors
    #[tracing::instrument(skip_all, fields(group = %group.describe(), permission = %permission.describe()))]
    pub async fn detach_permission_from_group(
        &self,
        group: &GroupRef,
        permission: &PermissionRef,
        guard: Option<&str>,
    ) -> Result<(), DomainError> {
        let graph = self.ctx.graph().await?;
        let (group, permission) = self.group_and_permission(&graph, group, permission, guard)?;

        let detached = self
            .ctx
            .storage
            .with_timeout(
                "detach_group_permission",
                self.ctx
                    .storage
                    .store()
                    .detach_group_permission(group.id, permission.id),
            )
            .await?;

        if detached {
            self.ctx.cache.invalidate();
            info!(group_id = %group.id, permission_id = %permission.id, "Detached permission from group");
        }
        Ok(())
    }

    /// Replace the permission set of a group. Every reference is resolved
    /// and guard-checked before the store is touched.
    ///
    /// # Errors
    ///
    /// - `GroupNotFound` / `PermissionNotFound` on a miss
    /// - [`DomainError::GuardMismatch`] if any guard differs
    /// - Storage errors
    #[tracing::instrument(skip_all, fields(group = %group.describe(), count = permissions.len()))]
    pub async fn sync_group_permissions(
        &self,
        group: &GroupRef,
        permissions: &[PermissionRef],
        guard: Option<&str>,
    ) -> Result<(), DomainError> {
        let graph = self.ctx.graph().await?;
        let group = self.lookup_group(&graph, group, guard)?;

        let mut ids: Vec<PermissionId> = Vec::with_capacity(permissions.len());
        for reference in permissions {
            let permission = PermissionsContext::permission(&graph, reference, &group.guard, None)?;
            ensure_same_guard(&group, &permission)?;
            if !ids.contains(&permission.id) {
                ids.push(permission.id);
            }
        }

        let count = ids.len();
        self.ctx
            .storage
            .with_timeout(
                "replace_group_permissions",
                self.ctx.storage.store().replace_group_permissions(group.id, ids),
            )
            .await?;
        self.ctx.cache.invalidate();

        info!(group_id = %group.id, permissions = count, "Synced group permissions");
        Ok(())
    }

    /// Whether the group carries the permission. Unknown names, or a
    /// permission from another guard, give `false`.
    ///
    /// # Errors
    ///
    /// Storage errors from rebuilding the graph.
    pub async fn group_has_permission(
        &self,
        group: &GroupRef,
        permission: &PermissionRef,
        guard: Option<&str>,
    ) -> Result<bool, DomainError> {
        let graph = self.ctx.graph().await?;
        let Ok(group) = self.lookup_group(&graph, group, guard) else {
            return Ok(false);
        };
        let Some(permission) = graph.find_permission(permission, &group.guard, None) else {
            return Ok(false);
        };
        Ok(permission.guard == group.guard && graph.group_has_permission(group.id, permission.id))
    }

    pub(crate) fn lookup_permission(
        &self,
        graph: &PermissionGraph,
        reference: &PermissionRef,
        guard: Option<&str>,
    ) -> Result<Permission, DomainError> {
        let guard_name = self.ctx.guards.resolve(guard);
        let permission = PermissionsContext::permission(graph, reference, &guard_name, None)?;
        if guard.is_some() && permission.guard != guard_name {
            return Err(DomainError::permission_not_found(reference.describe()));
        }
        Ok(permission)
    }

    pub(crate) fn lookup_group(
        &self,
        graph: &PermissionGraph,
        reference: &GroupRef,
        guard: Option<&str>,
    ) -> Result<Group, DomainError> {
        let guard_name = self.ctx.guards.resolve(guard);
        let group = PermissionsContext::group(graph, reference, &guard_name)?;
        if guard.is_some() && group.guard != guard_name {
            return Err(DomainError::group_not_found(reference.describe()));
        }
        Ok(group)
    }

    fn group_and_permission(
        &self,
        graph: &PermissionGraph,
        group: &GroupRef,
        permission: &PermissionRef,
        guard: Option<&str>,
    ) -> Result<(Group, Permission), DomainError> {
        let group = self.lookup_group(graph, group, guard)?;
        let permission = PermissionsContext::permission(graph, permission, &group.guard, None)?;
        ensure_same_guard(&group, &permission)?;
        Ok((group, permission))
    }
}

fn ensure_same_guard(group: &Group, permission: &Permission) -> Result<(), DomainError> {
    if group.guard == permission.guard {
        Ok(())
    } else {
        Err(DomainError::GuardMismatch {
            given: permission.guard.clone(),
            expected: vec![group.guard.clone()],
        })
    }
}
