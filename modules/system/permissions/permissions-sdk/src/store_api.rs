//! Storage contract for permission backends.
//!
//! The resolver is storage-engine agnostic. A backend implements the three
//! narrow traits below; [`PermissionStore`] is their union and is what the
//! module is constructed with. Backends must enforce the uniqueness and
//! cascade rules documented on each method.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{
    DirectGrant, Group, GroupId, IdentitySnapshot, Membership, Permission, PermissionId,
    PrincipalKey,
};

/// Permissions, groups, and which groups carry which permissions.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Load every permission, group, and group/permission edge in one consistent read.
    async fn load_snapshot(&self) -> Result<IdentitySnapshot, StoreError>;

    /// Insert a permission. `Conflict` if `(name, guard, scope)` is taken.
    async fn insert_permission(&self, permission: Permission) -> Result<Permission, StoreError>;

    /// Delete a permission and every grant referencing it.
    /// Returns `false` if it did not exist.
    async fn delete_permission(&self, id: PermissionId) -> Result<bool, StoreError>;

    /// Insert a group. `Conflict` if `(name, guard)` is taken.
    async fn insert_group(&self, group: Group) -> Result<Group, StoreError>;

    /// Delete a group, its permission edges, memberships, and current-group
    /// pointers targeting it. Returns `false` if it did not exist.
    async fn delete_group(&self, id: GroupId) -> Result<bool, StoreError>;

    /// Returns `true` if the edge was newly created.
    async fn attach_group_permission(
        &self,
        group_id: GroupId,
        permission_id: PermissionId,
    ) -> Result<bool, StoreError>;

    /// Returns `true` if the edge existed.
    async fn detach_group_permission(
        &self,
        group_id: GroupId,
        permission_id: PermissionId,
    ) -> Result<bool, StoreError>;

    /// Atomically replace the permission set of a group.
    async fn replace_group_permissions(
        &self,
        group_id: GroupId,
        permission_ids: Vec<PermissionId>,
    ) -> Result<(), StoreError>;
}

/// Direct permission grants of principals.
#[async_trait]
pub trait PermissionHolderStore: Send + Sync {
    async fn direct_grants(&self, principal: &PrincipalKey) -> Result<Vec<DirectGrant>, StoreError>;

    /// Returns `true` if the grant was newly added.
    async fn add_direct_grant(
        &self,
        principal: &PrincipalKey,
        grant: DirectGrant,
    ) -> Result<bool, StoreError>;

    /// Returns `true` if the grant existed.
    async fn remove_direct_grant(
        &self,
        principal: &PrincipalKey,
        grant: DirectGrant,
    ) -> Result<bool, StoreError>;

    /// Atomically replace every direct grant of a principal.
    async fn replace_direct_grants(
        &self,
        principal: &PrincipalKey,
        grants: Vec<DirectGrant>,
    ) -> Result<(), StoreError>;

    /// Principals holding the permission directly, in any scope.
    async fn direct_holders(&self, permission_id: PermissionId)
    -> Result<Vec<PrincipalKey>, StoreError>;
}

/// Group memberships of principals.
#[async_trait]
pub trait GroupMemberStore: Send + Sync {
    /// Memberships in join order.
    async fn memberships(&self, principal: &PrincipalKey) -> Result<Vec<Membership>, StoreError>;

    /// Returns `true` if the membership was newly added; an existing
    /// membership in the same group is left untouched.
    async fn add_membership(
        &self,
        principal: &PrincipalKey,
        membership: Membership,
    ) -> Result<bool, StoreError>;

    /// Remove the membership together with its membership-level grants, and
    /// clear the current-group pointer if it targets this group.
    /// Returns `true` if the membership existed.
    async fn remove_membership(
        &self,
        principal: &PrincipalKey,
        group_id: GroupId,
    ) -> Result<bool, StoreError>;

    /// Atomically replace every membership of a principal. Clears the
    /// current-group pointer if its group is not in the new set.
    async fn replace_memberships(
        &self,
        principal: &PrincipalKey,
        memberships: Vec<Membership>,
    ) -> Result<(), StoreError>;

    async fn members_of(&self, group_id: GroupId) -> Result<Vec<PrincipalKey>, StoreError>;

    /// Grant a permission on one membership. `NotFound` if there is no such membership.
    async fn add_membership_grant(
        &self,
        principal: &PrincipalKey,
        group_id: GroupId,
        permission_id: PermissionId,
    ) -> Result<bool, StoreError>;

    async fn remove_membership_grant(
        &self,
        principal: &PrincipalKey,
        group_id: GroupId,
        permission_id: PermissionId,
    ) -> Result<bool, StoreError>;

    /// Principals holding the permission through a membership-level grant.
    async fn membership_grant_holders(
        &self,
        permission_id: PermissionId,
    ) -> Result<Vec<PrincipalKey>, StoreError>;

    async fn current_group(&self, principal: &PrincipalKey) -> Result<Option<GroupId>, StoreError>;

    async fn set_current_group(
        &self,
        principal: &PrincipalKey,
        group_id: Option<GroupId>,
    ) -> Result<(), StoreError>;
}

/// Full storage contract required by the permissions module.
pub trait PermissionStore: IdentityStore + PermissionHolderStore + GroupMemberStore {}

impl<T> PermissionStore for T where T: IdentityStore + PermissionHolderStore + GroupMemberStore + ?Sized
{}
