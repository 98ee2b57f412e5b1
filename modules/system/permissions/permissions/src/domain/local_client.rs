//! Local (in-process) client for the permissions module.

use std::sync::Arc;

use async_trait::async_trait;
use permissions_sdk::{
    Group, GroupNames, GroupRef, NewGroup, NewPermission, Permission, PermissionRef,
    PermissionsClient, PermissionsError, Principal, PrincipalKey, ScopeId,
};

use super::service::deny_on_error;
use super::{DomainError, Service};

/// Local client wrapping the service.
pub struct PermissionsLocalClient {
    svc: Arc<Service>,
}

impl PermissionsLocalClient {
    #[must_use]
    pub fn new(svc: Arc<Service>) -> Self {
        Self { svc }
    }
}

fn log_and_convert(op: &str, e: DomainError) -> PermissionsError {
    tracing::error!(operation = op, error = ?e, "permissions call failed");
    e.into()
}

#[async_trait]
impl PermissionsClient for PermissionsLocalClient {
    async fn create_permission(&self, new: NewPermission) -> Result<Permission, PermissionsError> {
        self.svc
            .registry()
            .create_permission(new)
            .await
            .map_err(|e| log_and_convert("create_permission", e))
    }

    async fn find_permission(
        &self,
        permission: PermissionRef,
        guard: Option<&str>,
    ) -> Result<Permission, PermissionsError> {
        self.svc
            .registry()
            .find_permission(&permission, guard)
            .await
            .map_err(|e| log_and_convert("find_permission", e))
    }

    async fn find_or_create_permission(
        &self,
        new: NewPermission,
    ) -> Result<Permission, PermissionsError> {
        self.svc
            .registry()
            .find_or_create_permission(new)
            .await
            .map_err(|e| log_and_convert("find_or_create_permission", e))
    }

    async fn delete_permission(
        &self,
        permission: PermissionRef,
        guard: Option<&str>,
    ) -> Result<(), PermissionsError> {
        self.svc
            .registry()
            .delete_permission(&permission, guard)
            .await
            .map_err(|e| log_and_convert("delete_permission", e))
    }

    async fn create_group(&self, new: NewGroup) -> Result<Group, PermissionsError> {
        self.svc
            .registry()
            .create_group(new)
            .await
            .map_err(|e| log_and_convert("create_group", e))
    }

    async fn find_group(
        &self,
        group: GroupRef,
        guard: Option<&str>,
    ) -> Result<Group, PermissionsError> {
        self.svc
            .registry()
            .find_group(&group, guard)
            .await
            .map_err(|e| log_and_convert("find_group", e))
    }

    async fn find_or_create_group(&self, new: NewGroup) -> Result<Group, PermissionsError> {
        self.svc
            .registry()
            .find_or_create_group(new)
            .await
            .map_err(|e| log_and_convert("find_or_create_group", e))
    }

    async fn delete_group(
        &self,
        group: GroupRef,
        guard: Option<&str>,
    ) -> Result<(), PermissionsError> {
        self.svc
            .registry()
            .delete_group(&group, guard)
            .await
            .map_err(|e| log_and_convert("delete_group", e))
    }

    async fn attach_permission_to_group(
        &self,
        group: GroupRef,
        permission: PermissionRef,
        guard: Option<&str>,
    ) -> Result<(), PermissionsError> {
        self.svc
            .registry()
            .attach_permission_to_group(&group, &permission, guard)
            .await
            .map_err(|e| log_and_convert("attach_permission_to_group", e))
    }

    async fn detach_permission_from_group(
        &self,
        group: GroupRef,
        permission: PermissionRef,
        guard: Option<&str>,
    ) -> Result<(), PermissionsError> {
        self.svc
            .registry()
            .detach_permission_from_group(&group, &permission, guard)
            .await
            .map_err(|e| log_and_convert("detach_permission_from_group", e))
    }

    async fn sync_group_permissions(
        &self,
        group: GroupRef,
        permissions: Vec<PermissionRef>,
        guard: Option<&str>,
    ) -> Result<(), PermissionsError> {
        self.svc
            .registry()
            .sync_group_permissions(&group, &permissions, guard)
            .await
            .map_err(|e| log_and_convert("sync_group_permissions", e))
    }

    async fn group_has_permission(
        &self,
        group: GroupRef,
        permission: PermissionRef,
        guard: Option<&str>,
    ) -> bool {
        deny_on_error(
            "group_has_permission",
            self.svc
                .registry()
                .group_has_permission(&group, &permission, guard)
                .await,
        )
    }

    async fn grant_permission(
        &self,
        principal: &dyn Principal,
        permission: PermissionRef,
        scope: Option<ScopeId>,
    ) -> Result<(), PermissionsError> {
        self.svc
            .membership()
            .grant_permission(principal, &permission, scope)
            .await
            .map_err(|e| log_and_convert("grant_permission", e))
    }

    async fn revoke_permission(
        &self,
        principal: &dyn Principal,
        permission: PermissionRef,
        scope: Option<ScopeId>,
    ) -> Result<(), PermissionsError> {
        self.svc
            .membership()
            .revoke_permission(principal, &permission, scope)
            .await
            .map_err(|e| log_and_convert("revoke_permission", e))
    }

    async fn sync_permissions(
        &self,
        principal: &dyn Principal,
        permissions: Vec<PermissionRef>,
    ) -> Result<(), PermissionsError> {
        self.svc
            .membership()
            .sync_permissions(principal, &permissions)
            .await
            .map_err(|e| log_and_convert("sync_permissions", e))
    }

    async fn join_group(
        &self,
        principal: &dyn Principal,
        group: GroupRef,
        role: Option<String>,
        scope: Option<ScopeId>,
    ) -> Result<(), PermissionsError> {
        self.svc
            .membership()
            .join_group(principal, &group, role, scope)
            .await
            .map(|_| ())
            .map_err(|e| log_and_convert("join_group", e))
    }

    async fn leave_group(
        &self,
        principal: &dyn Principal,
        group: GroupRef,
    ) -> Result<(), PermissionsError> {
        self.svc
            .membership()
            .leave_group(principal, &group)
            .await
            .map_err(|e| log_and_convert("leave_group", e))
    }

    async fn sync_groups(
        &self,
        principal: &dyn Principal,
        groups: Vec<GroupRef>,
    ) -> Result<(), PermissionsError> {
        self.svc
            .membership()
            .sync_groups(principal, &groups)
            .await
            .map_err(|e| log_and_convert("sync_groups", e))
    }

    async fn direct_permissions_of(
        &self,
        principal: &dyn Principal,
    ) -> Result<Vec<Permission>, PermissionsError> {
        self.svc
            .membership()
            .direct_permissions_of(principal)
            .await
            .map_err(|e| log_and_convert("direct_permissions_of", e))
    }

    async fn groups_of(
        &self,
        principal: &dyn Principal,
        scope: Option<ScopeId>,
    ) -> Result<Vec<Group>, PermissionsError> {
        self.svc
            .membership()
            .groups_of(principal, scope)
            .await
            .map_err(|e| log_and_convert("groups_of", e))
    }

    async fn current_group_of(
        &self,
        principal: &dyn Principal,
    ) -> Result<Option<Group>, PermissionsError> {
        self.svc
            .membership()
            .current_group_of(principal)
            .await
            .map_err(|e| log_and_convert("current_group_of", e))
    }

    async fn current_group_name(
        &self,
        principal: &dyn Principal,
    ) -> Result<Option<String>, PermissionsError> {
        self.svc
            .membership()
            .current_group_name(principal)
            .await
            .map_err(|e| log_and_convert("current_group_name", e))
    }

    async fn switch_current_group(
        &self,
        principal: &dyn Principal,
        group: GroupRef,
    ) -> Result<Group, PermissionsError> {
        self.svc
            .membership()
            .switch_current_group(principal, &group)
            .await
            .map_err(|e| log_and_convert("switch_current_group", e))
    }

    async fn refresh_current_group(
        &self,
        principal: &dyn Principal,
    ) -> Result<Option<Group>, PermissionsError> {
        self.svc
            .membership()
            .refresh_current_group(principal)
            .await
            .map_err(|e| log_and_convert("refresh_current_group", e))
    }

    async fn create_owned_group(
        &self,
        principal: &dyn Principal,
        name: &str,
    ) -> Result<Group, PermissionsError> {
        self.svc
            .membership()
            .create_owned_group(principal, name)
            .await
            .map_err(|e| log_and_convert("create_owned_group", e))
    }

    async fn grant_permission_on_group(
        &self,
        principal: &dyn Principal,
        group: GroupRef,
        permission: PermissionRef,
    ) -> Result<(), PermissionsError> {
        self.svc
            .membership()
            .grant_permission_on_group(principal, &group, &permission)
            .await
            .map_err(|e| log_and_convert("grant_permission_on_group", e))
    }

    async fn revoke_permission_on_group(
        &self,
        principal: &dyn Principal,
        group: GroupRef,
        permission: PermissionRef,
    ) -> Result<(), PermissionsError> {
        self.svc
            .membership()
            .revoke_permission_on_group(principal, &group, &permission)
            .await
            .map_err(|e| log_and_convert("revoke_permission_on_group", e))
    }

    async fn role_on(
        &self,
        principal: &dyn Principal,
        group: GroupRef,
    ) -> Result<Option<String>, PermissionsError> {
        self.svc
            .membership()
            .role_on(principal, &group)
            .await
            .map_err(|e| log_and_convert("role_on", e))
    }

    async fn has_role_on(&self, principal: &dyn Principal, group: GroupRef, role: &str) -> bool {
        deny_on_error(
            "has_role_on",
            self.svc.membership().has_role_on(principal, &group, role).await,
        )
    }

    async fn belongs_to_any_group(&self, principal: &dyn Principal) -> bool {
        deny_on_error(
            "belongs_to_any_group",
            self.svc.membership().belongs_to_any_group(principal).await,
        )
    }

    async fn members_of(
        &self,
        group: GroupRef,
        guard: Option<&str>,
    ) -> Result<Vec<PrincipalKey>, PermissionsError> {
        self.svc
            .membership()
            .members_of(&group, guard)
            .await
            .map_err(|e| log_and_convert("members_of", e))
    }

    async fn has_permission(
        &self,
        principal: &dyn Principal,
        permission: Option<PermissionRef>,
        scope: Option<ScopeId>,
    ) -> bool {
        deny_on_error(
            "has_permission",
            self.svc
                .resolver()
                .has_permission(principal, permission.as_ref(), scope)
                .await,
        )
    }

    async fn can(&self, principal: &dyn Principal, ability: &str) -> bool {
        deny_on_error("can", self.svc.resolver().can(principal, ability).await)
    }

    async fn is_member_of_any(&self, principal: &dyn Principal, groups: GroupNames) -> bool {
        deny_on_error(
            "is_member_of_any",
            self.svc.resolver().is_member_of_any(principal, &groups).await,
        )
    }

    async fn is_member_of_all(&self, principal: &dyn Principal, groups: GroupNames) -> bool {
        deny_on_error(
            "is_member_of_all",
            self.svc.resolver().is_member_of_all(principal, &groups).await,
        )
    }

    async fn principals_with_permission(
        &self,
        permission: PermissionRef,
        guard: Option<&str>,
    ) -> Result<Vec<PrincipalKey>, PermissionsError> {
        self.svc
            .resolver()
            .principals_with_permission(&permission, guard)
            .await
            .map_err(|e| log_and_convert("principals_with_permission", e))
    }
}
