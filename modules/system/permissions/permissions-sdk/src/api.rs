//! Public API trait for the permissions module.

use async_trait::async_trait;

use crate::error::PermissionsError;
use crate::group_names::GroupNames;
use crate::models::{
    Group, GroupRef, NewGroup, NewPermission, Permission, PermissionRef, Principal, PrincipalKey,
    ScopeId,
};

/// Public API of the permissions module.
///
/// Returned by `PermissionsModule::init` and consumed by request guards
/// (queries) and administrative tooling (mutations):
///
/// ```ignore
/// let perms = module.init(cfg, store)?;
///
/// if !perms.can(&user, "edit-articles").await {
///     return Err(StatusCode::FORBIDDEN);
/// }
/// ```
///
/// Authorization checks (`has_permission`, `can`, `is_member_of_*`,
/// `has_role_on`, `group_has_permission`) return plain booleans and fail
/// closed: unknown names, cross-guard references, and storage failures all
/// resolve to `false`. Mutations and explicit lookups return typed errors.
#[async_trait]
pub trait PermissionsClient: Send + Sync {
    // ------------------------------------------------------------------
    // Identity registry
    // ------------------------------------------------------------------

    /// Create a permission.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if `(name, guard, scope)` is taken
    /// - `StorageUnavailable` if the store cannot be reached
    async fn create_permission(&self, new: NewPermission) -> Result<Permission, PermissionsError>;

    /// Find a permission by name or id. A name is looked up unscoped in
    /// `guard` (default guard when `None`).
    ///
    /// # Errors
    ///
    /// - `NotFound` if no such permission exists in the guard
    async fn find_permission(
        &self,
        permission: PermissionRef,
        guard: Option<&str>,
    ) -> Result<Permission, PermissionsError>;

    /// Return the existing permission or create it.
    ///
    /// # Errors
    ///
    /// - `StorageUnavailable` if the store cannot be reached
    async fn find_or_create_permission(
        &self,
        new: NewPermission,
    ) -> Result<Permission, PermissionsError>;

    /// Delete a permission and every grant referencing it.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no such permission exists
    async fn delete_permission(
        &self,
        permission: PermissionRef,
        guard: Option<&str>,
    ) -> Result<(), PermissionsError>;

    /// Create a group.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if the name is taken within the guard
    async fn create_group(&self, new: NewGroup) -> Result<Group, PermissionsError>;

    /// Find a group by name or id.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no such group exists in the guard
    async fn find_group(&self, group: GroupRef, guard: Option<&str>)
    -> Result<Group, PermissionsError>;

    /// Return the existing group or create it.
    ///
    /// # Errors
    ///
    /// - `StorageUnavailable` if the store cannot be reached
    async fn find_or_create_group(&self, new: NewGroup) -> Result<Group, PermissionsError>;

    /// Delete a group, its permission edges and all memberships.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no such group exists
    async fn delete_group(&self, group: GroupRef, guard: Option<&str>)
    -> Result<(), PermissionsError>;

    /// Let every member of `group` hold `permission`. Idempotent.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the group or permission does not exist
    /// - `GuardMismatch` if the permission belongs to another guard
    async fn attach_permission_to_group(
        &self,
        group: GroupRef,
        permission: PermissionRef,
        guard: Option<&str>,
    ) -> Result<(), PermissionsError>;

    /// Remove `permission` from `group`. Idempotent.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the group or permission does not exist
    /// - `GuardMismatch` if the permission belongs to another guard
    async fn detach_permission_from_group(
        &self,
        group: GroupRef,
        permission: PermissionRef,
        guard: Option<&str>,
    ) -> Result<(), PermissionsError>;

    /// Replace the permission set of a group. An empty list clears it.
    ///
    /// # Errors
    ///
    /// - `NotFound` / `GuardMismatch` for any listed permission; nothing is changed
    async fn sync_group_permissions(
        &self,
        group: GroupRef,
        permissions: Vec<PermissionRef>,
        guard: Option<&str>,
    ) -> Result<(), PermissionsError>;

    /// Whether the group carries the permission. Unknown names give `false`.
    async fn group_has_permission(
        &self,
        group: GroupRef,
        permission: PermissionRef,
        guard: Option<&str>,
    ) -> bool;

    // ------------------------------------------------------------------
    // Membership index
    // ------------------------------------------------------------------

    /// Grant a permission directly to a principal. Idempotent.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the permission does not exist
    /// - `GuardMismatch` if the permission's guard is not one of the principal's guards
    async fn grant_permission(
        &self,
        principal: &dyn Principal,
        permission: PermissionRef,
        scope: Option<ScopeId>,
    ) -> Result<(), PermissionsError>;

    /// Revoke a direct grant. Revoking an absent grant is a no-op.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the permission does not exist
    async fn revoke_permission(
        &self,
        principal: &dyn Principal,
        permission: PermissionRef,
        scope: Option<ScopeId>,
    ) -> Result<(), PermissionsError>;

    /// Replace all direct grants of a principal. An empty list clears them.
    ///
    /// # Errors
    ///
    /// - `NotFound` / `GuardMismatch` for any listed permission; nothing is changed
    async fn sync_permissions(
        &self,
        principal: &dyn Principal,
        permissions: Vec<PermissionRef>,
    ) -> Result<(), PermissionsError>;

    /// Join a group with an optional role label and scope. Idempotent.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the group does not exist
    /// - `GuardMismatch` if the group's guard is not one of the principal's guards
    async fn join_group(
        &self,
        principal: &dyn Principal,
        group: GroupRef,
        role: Option<String>,
        scope: Option<ScopeId>,
    ) -> Result<(), PermissionsError>;

    /// Leave a group. Leaving a group the principal is not in is a no-op.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the group does not exist
    /// - `GuardMismatch` if the group's guard is not one of the principal's guards
    async fn leave_group(
        &self,
        principal: &dyn Principal,
        group: GroupRef,
    ) -> Result<(), PermissionsError>;

    /// Replace all group memberships of a principal. An empty list clears them.
    ///
    /// # Errors
    ///
    /// - `NotFound` / `GuardMismatch` for any listed group; nothing is changed
    async fn sync_groups(
        &self,
        principal: &dyn Principal,
        groups: Vec<GroupRef>,
    ) -> Result<(), PermissionsError>;

    /// Permissions granted directly to the principal.
    ///
    /// # Errors
    ///
    /// - `StorageUnavailable` if the store cannot be reached
    async fn direct_permissions_of(
        &self,
        principal: &dyn Principal,
    ) -> Result<Vec<Permission>, PermissionsError>;

    /// Groups the principal belongs to, in join order. With a scope, only
    /// memberships that are unscoped or in that scope are listed.
    ///
    /// # Errors
    ///
    /// - `StorageUnavailable` if the store cannot be reached
    async fn groups_of(
        &self,
        principal: &dyn Principal,
        scope: Option<ScopeId>,
    ) -> Result<Vec<Group>, PermissionsError>;

    /// The principal's current group. Defaults to (and persists) the first
    /// joined group; `None` if the principal belongs to no group.
    ///
    /// # Errors
    ///
    /// - `StorageUnavailable` if the store cannot be reached
    async fn current_group_of(
        &self,
        principal: &dyn Principal,
    ) -> Result<Option<Group>, PermissionsError>;

    /// Name of [`Self::current_group_of`].
    ///
    /// # Errors
    ///
    /// - `StorageUnavailable` if the store cannot be reached
    async fn current_group_name(
        &self,
        principal: &dyn Principal,
    ) -> Result<Option<String>, PermissionsError>;

    /// Point the principal's current group at `group`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the group does not exist
    /// - `NotAMember` if the principal is not in the group
    async fn switch_current_group(
        &self,
        principal: &dyn Principal,
        group: GroupRef,
    ) -> Result<Group, PermissionsError>;

    /// Clear the current-group pointer and derive the default again.
    ///
    /// # Errors
    ///
    /// - `StorageUnavailable` if the store cannot be reached
    async fn refresh_current_group(
        &self,
        principal: &dyn Principal,
    ) -> Result<Option<Group>, PermissionsError>;

    /// Create a team owned by the principal, join it as owner and make it current.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if the name is taken in the principal's guard
    async fn create_owned_group(
        &self,
        principal: &dyn Principal,
        name: &str,
    ) -> Result<Group, PermissionsError>;

    /// Grant a permission on the principal's membership in `group` only.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the group or permission does not exist
    /// - `GuardMismatch` if the permission's guard is not one of the principal's guards
    /// - `NotAMember` if the principal is not in the group
    async fn grant_permission_on_group(
        &self,
        principal: &dyn Principal,
        group: GroupRef,
        permission: PermissionRef,
    ) -> Result<(), PermissionsError>;

    /// Revoke a membership-level grant. Idempotent.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the group or permission does not exist
    /// - `NotAMember` if the principal is not in the group
    async fn revoke_permission_on_group(
        &self,
        principal: &dyn Principal,
        group: GroupRef,
        permission: PermissionRef,
    ) -> Result<(), PermissionsError>;

    /// Role label of the principal within `group`; `None` if not a member.
    ///
    /// # Errors
    ///
    /// - `StorageUnavailable` if the store cannot be reached
    async fn role_on(
        &self,
        principal: &dyn Principal,
        group: GroupRef,
    ) -> Result<Option<String>, PermissionsError>;

    /// Whether the principal's role within `group` equals `role`.
    async fn has_role_on(&self, principal: &dyn Principal, group: GroupRef, role: &str) -> bool;

    /// Whether the principal belongs to at least one group.
    async fn belongs_to_any_group(&self, principal: &dyn Principal) -> bool;

    /// Principals that joined `group`. Unknown groups give an empty list.
    ///
    /// # Errors
    ///
    /// - `StorageUnavailable` if the store cannot be reached
    async fn members_of(
        &self,
        group: GroupRef,
        guard: Option<&str>,
    ) -> Result<Vec<PrincipalKey>, PermissionsError>;

    // ------------------------------------------------------------------
    // Resolver
    // ------------------------------------------------------------------

    /// Whether the principal holds the permission, directly or through a group.
    ///
    /// `None` and unknown permissions give `false`. With a scope, grants and
    /// memberships that are unscoped or in that scope count; without one,
    /// only unscoped ones do.
    async fn has_permission(
        &self,
        principal: &dyn Principal,
        permission: Option<PermissionRef>,
        scope: Option<ScopeId>,
    ) -> bool;

    /// Gate integration point; same as `has_permission(principal, Some(ability), None)`.
    async fn can(&self, principal: &dyn Principal, ability: &str) -> bool;

    /// Whether the principal belongs to or owns at least one named group.
    async fn is_member_of_any(&self, principal: &dyn Principal, groups: GroupNames) -> bool;

    /// Whether the principal belongs to every named group.
    async fn is_member_of_all(&self, principal: &dyn Principal, groups: GroupNames) -> bool;

    /// Principals holding the permission directly, through a group, or through
    /// a membership-level grant. Unknown permissions give an empty list.
    ///
    /// # Errors
    ///
    /// - `StorageUnavailable` if the store cannot be reached
    async fn principals_with_permission(
        &self,
        permission: PermissionRef,
        guard: Option<&str>,
    ) -> Result<Vec<PrincipalKey>, PermissionsError>;
}
