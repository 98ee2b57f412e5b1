//! In-memory implementation of the permission store.
//!
//! All state lives behind one `tokio::sync::RwLock`, so every call, including
//! the `replace_*` calls, is atomic with respect to concurrent readers.
//! Deletes cascade by scanning. State is lost on restart; use it for tests,
//! local development and single-process deployments that seed their
//! permissions at startup.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use permissions_sdk::{
    DirectGrant, Group, GroupId, GroupMemberStore, IdentitySnapshot, IdentityStore, Membership,
    Permission, PermissionHolderStore, PermissionId, PrincipalKey, StoreError,
};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct State {
    permissions: HashMap<PermissionId, Permission>,
    groups: HashMap<GroupId, Group>,
    /// Edges per group, in attach order.
    group_permissions: HashMap<GroupId, Vec<PermissionId>>,
    direct_grants: HashMap<PrincipalKey, Vec<DirectGrant>>,
    /// Memberships per principal, in join order.
    memberships: HashMap<PrincipalKey, Vec<Membership>>,
    current_groups: HashMap<PrincipalKey, GroupId>,
}

impl State {
    fn require_permission(&self, id: PermissionId) -> Result<(), StoreError> {
        if self.permissions.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("permission {id}")))
        }
    }

    fn require_group(&self, id: GroupId) -> Result<(), StoreError> {
        if self.groups.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("group {id}")))
        }
    }
}

/// In-memory permission store.
#[derive(Debug, Default)]
pub struct InMemoryPermissionStore {
    state: RwLock<State>,
    /// Artificial delay applied to every call, in milliseconds.
    latency_ms: AtomicU64,
}

impl InMemoryPermissionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every subsequent call by `latency`. Useful to exercise storage
    /// timeouts; `Duration::ZERO` turns it off.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(ms, Ordering::Relaxed);
    }

    async fn delay(&self) {
        let ms = self.latency_ms.load(Ordering::Relaxed);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl IdentityStore for InMemoryPermissionStore {
    async fn load_snapshot(&self) -> Result<IdentitySnapshot, StoreError> {
        self.delay().await;
        let state = self.state.read().await;

        let mut permissions: Vec<Permission> = state.permissions.values().cloned().collect();
        permissions.sort_by_key(|p| p.created_at);
        let mut groups: Vec<Group> = state.groups.values().cloned().collect();
        groups.sort_by_key(|g| g.created_at);

        Ok(IdentitySnapshot {
            permissions,
            groups,
            group_permissions: state
                .group_permissions
                .iter()
                .flat_map(|(group_id, ids)| ids.iter().map(move |id| (*group_id, *id)))
                .collect(),
        })
    }

    async fn insert_permission(&self, permission: Permission) -> Result<Permission, StoreError> {
        self.delay().await;
        let mut state = self.state.write().await;

        if state.permissions.values().any(|p| {
            p.name == permission.name && p.guard == permission.guard && p.scope == permission.scope
        }) {
            return Err(StoreError::Conflict(format!(
                "permission `{}` already exists for guard `{}`",
                permission.name, permission.guard
            )));
        }
        if state.permissions.contains_key(&permission.id) {
            return Err(StoreError::Conflict(format!("permission {}", permission.id)));
        }

        state.permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }

    async fn delete_permission(&self, id: PermissionId) -> Result<bool, StoreError> {
        self.delay().await;
        let mut state = self.state.write().await;

        if state.permissions.remove(&id).is_none() {
            return Ok(false);
        }
        for ids in state.group_permissions.values_mut() {
            ids.retain(|p| *p != id);
        }
        for grants in state.direct_grants.values_mut() {
            grants.retain(|g| g.permission_id != id);
        }
        for memberships in state.memberships.values_mut() {
            for membership in memberships.iter_mut() {
                membership.permissions.retain(|p| *p != id);
            }
        }
        Ok(true)
    }

    async fn insert_group(&self, group: Group) -> Result<Group, StoreError> {
        self.delay().await;
        let mut state = self.state.write().await;

        if state
            .groups
            .values()
            .any(|g| g.name == group.name && g.guard == group.guard)
        {
            return Err(StoreError::Conflict(format!(
                "group `{}` already exists for guard `{}`",
                group.name, group.guard
            )));
        }
        if state.groups.contains_key(&group.id) {
            return Err(StoreError::Conflict(format!("group {}", group.id)));
        }

        state.groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn delete_group(&self, id: GroupId) -> Result<bool, StoreError> {
        self.delay().await;
        let mut state = self.state.write().await;

        if state.groups.remove(&id).is_none() {
            return Ok(false);
        }
        state.group_permissions.remove(&id);
        for memberships in state.memberships.values_mut() {
            memberships.retain(|m| m.group_id != id);
        }
        state.current_groups.retain(|_, group_id| *group_id != id);
        Ok(true)
    }

    async fn attach_group_permission(
        &self,
        group_id: GroupId,
        permission_id: PermissionId,
    ) -> Result<bool, StoreError> {
        self.delay().await;
        let mut state = self.state.write().await;
        state.require_group(group_id)?;
        state.require_permission(permission_id)?;

        let ids = state.group_permissions.entry(group_id).or_default();
        if ids.contains(&permission_id) {
            return Ok(false);
        }
        ids.push(permission_id);
        Ok(true)
    }

    async fn detach_group_permission(
        &self,
        group_id: GroupId,
        permission_id: PermissionId,
    ) -> Result<bool, StoreError> {
        self.delay().await;
        let mut state = self.state.write().await;

        let Some(ids) = state.group_permissions.get_mut(&group_id) else {
            return Ok(false);
        };
        let before = ids.len();
        ids.retain(|p| *p != permission_id);
        Ok(ids.len() != before)
    }

    async fn replace_group_permissions(
        &self,
        group_id: GroupId,
        permission_ids: Vec<PermissionId>,
    ) -> Result<(), StoreError> {
        self.delay().await;
        let mut state = self.state.write().await;
        state.require_group(group_id)?;
        for id in &permission_ids {
            state.require_permission(*id)?;
        }

        state.group_permissions.insert(group_id, permission_ids);
        Ok(())
    }
}

#[async_trait]
impl PermissionHolderStore for InMemoryPermissionStore {
    async fn direct_grants(&self, principal: &PrincipalKey) -> Result<Vec<DirectGrant>, StoreError> {
        self.delay().await;
        let state = self.state.read().await;
        Ok(state.direct_grants.get(principal).cloned().unwrap_or_default())
    }

    async fn add_direct_grant(
        &self,
        principal: &PrincipalKey,
        grant: DirectGrant,
    ) -> Result<bool, StoreError> {
        self.delay().await;
        let mut state = self.state.write().await;
        state.require_permission(grant.permission_id)?;

        let grants = state.direct_grants.entry(principal.clone()).or_default();
        if grants.contains(&grant) {
            return Ok(false);
        }
        grants.push(grant);
        Ok(true)
    }

    async fn remove_direct_grant(
        &self,
        principal: &PrincipalKey,
        grant: DirectGrant,
    ) -> Result<bool, StoreError> {
        self.delay().await;
        let mut state = self.state.write().await;

        let Some(grants) = state.direct_grants.get_mut(principal) else {
            return Ok(false);
        };
        let before = grants.len();
        grants.retain(|g| *g != grant);
        Ok(grants.len() != before)
    }

    async fn replace_direct_grants(
        &self,
        principal: &PrincipalKey,
        grants: Vec<DirectGrant>,
    ) -> Result<(), StoreError> {
        self.delay().await;
        let mut state = self.state.write().await;
        for grant in &grants {
            state.require_permission(grant.permission_id)?;
        }

        if grants.is_empty() {
            state.direct_grants.remove(principal);
        } else {
            state.direct_grants.insert(principal.clone(), grants);
        }
        Ok(())
    }

    async fn direct_holders(
        &self,
        permission_id: PermissionId,
    ) -> Result<Vec<PrincipalKey>, StoreError> {
        self.delay().await;
        let state = self.state.read().await;

        let mut holders: Vec<PrincipalKey> = state
            .direct_grants
            .iter()
            .filter(|(_, grants)| grants.iter().any(|g| g.permission_id == permission_id))
            .map(|(principal, _)| principal.clone())
            .collect();
        holders.sort();
        Ok(holders)
    }
}

#[async_trait]
impl GroupMemberStore for InMemoryPermissionStore {
    async fn memberships(&self, principal: &PrincipalKey) -> Result<Vec<Membership>, StoreError> {
        self.delay().await;
        let state = self.state.read().await;
        Ok(state.memberships.get(principal).cloned().unwrap_or_default())
    }

    async fn add_membership(
        &self,
        principal: &PrincipalKey,
        membership: Membership,
    ) -> Result<bool, StoreError> {
        self.delay().await;
        let mut state = self.state.write().await;
        state.require_group(membership.group_id)?;

        let memberships = state.memberships.entry(principal.clone()).or_default();
        if memberships.iter().any(|m| m.group_id == membership.group_id) {
            return Ok(false);
        }
        memberships.push(membership);
        Ok(true)
    }

    async fn remove_membership(
        &self,
        principal: &PrincipalKey,
        group_id: GroupId,
    ) -> Result<bool, StoreError> {
        self.delay().await;
        let mut state = self.state.write().await;

        let removed = match state.memberships.get_mut(principal) {
            Some(memberships) => {
                let before = memberships.len();
                memberships.retain(|m| m.group_id != group_id);
                memberships.len() != before
            }
            None => false,
        };
        if state.current_groups.get(principal) == Some(&group_id) {
            state.current_groups.remove(principal);
        }
        Ok(removed)
    }

    async fn replace_memberships(
        &self,
        principal: &PrincipalKey,
        memberships: Vec<Membership>,
    ) -> Result<(), StoreError> {
        self.delay().await;
        let mut state = self.state.write().await;
        for membership in &memberships {
            state.require_group(membership.group_id)?;
        }

        if let Some(current) = state.current_groups.get(principal).copied()
            && !memberships.iter().any(|m| m.group_id == current)
        {
            state.current_groups.remove(principal);
        }
        if memberships.is_empty() {
            state.memberships.remove(principal);
        } else {
            state.memberships.insert(principal.clone(), memberships);
        }
        Ok(())
    }

    async fn members_of(&self, group_id: GroupId) -> Result<Vec<PrincipalKey>, StoreError> {
        self.delay().await;
        let state = self.state.read().await;

        let mut members: Vec<PrincipalKey> = state
            .memberships
            .iter()
            .filter(|(_, memberships)| memberships.iter().any(|m| m.group_id == group_id))
            .map(|(principal, _)| principal.clone())
            .collect();
        members.sort();
        Ok(members)
    }

    async fn add_membership_grant(
        &self,
        principal: &PrincipalKey,
        group_id: GroupId,
        permission_id: PermissionId,
    ) -> Result<bool, StoreError> {
        self.delay().await;
        let mut state = self.state.write().await;
        state.require_permission(permission_id)?;

        let membership = state
            .memberships
            .get_mut(principal)
            .and_then(|memberships| memberships.iter_mut().find(|m| m.group_id == group_id))
            .ok_or_else(|| StoreError::NotFound(format!("membership in group {group_id}")))?;

        if membership.permissions.contains(&permission_id) {
            return Ok(false);
        }
        membership.permissions.push(permission_id);
        Ok(true)
    }

    async fn remove_membership_grant(
        &self,
        principal: &PrincipalKey,
        group_id: GroupId,
        permission_id: PermissionId,
    ) -> Result<bool, StoreError> {
        self.delay().await;
        let mut state = self.state.write().await;

        let Some(membership) = state
            .memberships
            .get_mut(principal)
            .and_then(|memberships| memberships.iter_mut().find(|m| m.group_id == group_id))
        else {
            return Ok(false);
        };
        let before = membership.permissions.len();
        membership.permissions.retain(|p| *p != permission_id);
        Ok(membership.permissions.len() != before)
    }

    async fn membership_grant_holders(
        &self,
        permission_id: PermissionId,
    ) -> Result<Vec<PrincipalKey>, StoreError> {
        self.delay().await;
        let state = self.state.read().await;

        let mut holders: Vec<PrincipalKey> = state
            .memberships
            .iter()
            .filter(|(_, memberships)| {
                memberships
                    .iter()
                    .any(|m| m.permissions.contains(&permission_id))
            })
            .map(|(principal, _)| principal.clone())
            .collect();
        holders.sort();
        Ok(holders)
    }

    async fn current_group(&self, principal: &PrincipalKey) -> Result<Option<GroupId>, StoreError> {
        self.delay().await;
        let state = self.state.read().await;
        Ok(state.current_groups.get(principal).copied())
    }

    async fn set_current_group(
        &self,
        principal: &PrincipalKey,
        group_id: Option<GroupId>,
    ) -> Result<(), StoreError> {
        self.delay().await;
        let mut state = self.state.write().await;

        match group_id {
            Some(group_id) => {
                state.require_group(group_id)?;
                state.current_groups.insert(principal.clone(), group_id);
            }
            None => {
                state.current_groups.remove(principal);
            }
        }
        Ok(())
    }
}
