//! Domain models for the permissions module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Permission identifier.
pub type PermissionId = Uuid;
/// Group identifier.
pub type GroupId = Uuid;
/// Principal identifier (user, admin, service account).
pub type PrincipalId = Uuid;
/// Tenant/team scope identifier.
pub type ScopeId = Uuid;

/// A named permission within a guard and optional scope.
///
/// `(name, guard, scope)` is unique across the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    /// Guard this permission belongs to (e.g. `"web"`, `"admin"`).
    pub guard: String,
    /// Optional tenant/team the permission is scoped to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeId>,
    pub created_at: DateTime<Utc>,
}

/// A named collection of permissions that principals can join.
///
/// A group with an owner is a *team*. Ownership confers no permissions
/// beyond membership; it only counts towards `is_member_of_any`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub guard: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<PrincipalId>,
    pub created_at: DateTime<Utc>,
}

impl Group {
    /// Whether this group has an owner.
    #[must_use]
    pub fn is_team(&self) -> bool {
        self.owner_id.is_some()
    }

    #[must_use]
    pub fn is_owned_by(&self, principal_id: PrincipalId) -> bool {
        self.owner_id == Some(principal_id)
    }
}

/// A principal's membership in a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub group_id: GroupId,
    /// Team/tenant the membership applies to. `None` applies everywhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeId>,
    /// Free-text role within the group (e.g. `"Owner"`, `"User"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Permissions granted on this membership only.
    #[serde(default)]
    pub permissions: Vec<PermissionId>,
    pub joined_at: DateTime<Utc>,
}

impl Membership {
    #[must_use]
    pub fn new(group_id: GroupId, role: Option<String>, scope: Option<ScopeId>) -> Self {
        Self {
            group_id,
            scope,
            role,
            permissions: Vec::new(),
            joined_at: Utc::now(),
        }
    }
}

/// A permission granted straight to a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectGrant {
    pub permission_id: PermissionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeId>,
}

/// Storage key of a principal: its type tag plus its identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrincipalKey {
    pub principal_type: String,
    pub id: PrincipalId,
}

impl PrincipalKey {
    #[must_use]
    pub fn new(principal_type: impl Into<String>, id: PrincipalId) -> Self {
        Self {
            principal_type: principal_type.into(),
            id,
        }
    }
}

/// The authenticated entity being authorized.
///
/// Implemented by the host's user/admin types. The resolver only needs a
/// stable identifier and a type tag; guards are derived from the type tag
/// through the configured guard registry unless [`Principal::guard`] pins one.
pub trait Principal: Send + Sync {
    fn principal_id(&self) -> PrincipalId;

    /// Type tag (e.g. `"user"`, `"admin"`), matched against guard configuration.
    fn principal_type(&self) -> &str;

    /// Explicit guard, overriding the guard registry lookup.
    fn guard(&self) -> Option<&str> {
        None
    }

    fn key(&self) -> PrincipalKey {
        PrincipalKey::new(self.principal_type(), self.principal_id())
    }
}

/// Plain-value [`Principal`] for hosts that don't have a richer type at hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalRef {
    pub id: PrincipalId,
    pub principal_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,
}

impl PrincipalRef {
    #[must_use]
    pub fn new(principal_type: impl Into<String>, id: PrincipalId) -> Self {
        Self {
            id,
            principal_type: principal_type.into(),
            guard: None,
        }
    }

    /// Pin the principal to a specific guard.
    #[must_use]
    pub fn with_guard(mut self, guard: impl Into<String>) -> Self {
        self.guard = Some(guard.into());
        self
    }
}

impl Principal for PrincipalRef {
    fn principal_id(&self) -> PrincipalId {
        self.id
    }

    fn principal_type(&self) -> &str {
        &self.principal_type
    }

    fn guard(&self) -> Option<&str> {
        self.guard.as_deref()
    }
}

/// Reference to a permission, resolved once at the API boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionRef {
    ByName(String),
    ById(PermissionId),
    Resolved(Permission),
}

impl PermissionRef {
    /// Human-readable form used in error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::ByName(name) => name.clone(),
            Self::ById(id) => id.to_string(),
            Self::Resolved(p) => p.name.clone(),
        }
    }
}

impl From<&str> for PermissionRef {
    fn from(name: &str) -> Self {
        Self::ByName(name.to_owned())
    }
}

impl From<String> for PermissionRef {
    fn from(name: String) -> Self {
        Self::ByName(name)
    }
}

impl From<PermissionId> for PermissionRef {
    fn from(id: PermissionId) -> Self {
        Self::ById(id)
    }
}

impl From<Permission> for PermissionRef {
    fn from(permission: Permission) -> Self {
        Self::Resolved(permission)
    }
}

impl From<&Permission> for PermissionRef {
    fn from(permission: &Permission) -> Self {
        Self::Resolved(permission.clone())
    }
}

/// Reference to a group, resolved once at the API boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupRef {
    ByName(String),
    ById(GroupId),
    Resolved(Group),
}

impl GroupRef {
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::ByName(name) => name.clone(),
            Self::ById(id) => id.to_string(),
            Self::Resolved(g) => g.name.clone(),
        }
    }
}

impl From<&str> for GroupRef {
    fn from(name: &str) -> Self {
        Self::ByName(name.to_owned())
    }
}

impl From<String> for GroupRef {
    fn from(name: String) -> Self {
        Self::ByName(name)
    }
}

impl From<GroupId> for GroupRef {
    fn from(id: GroupId) -> Self {
        Self::ById(id)
    }
}

impl From<Group> for GroupRef {
    fn from(group: Group) -> Self {
        Self::Resolved(group)
    }
}

impl From<&Group> for GroupRef {
    fn from(group: &Group) -> Self {
        Self::Resolved(group.clone())
    }
}

/// Parameters for creating a permission.
///
/// `guard: None` means the configured default guard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPermission {
    pub name: String,
    #[serde(default)]
    pub guard: Option<String>,
    #[serde(default)]
    pub scope: Option<ScopeId>,
}

impl NewPermission {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn guard(mut self, guard: impl Into<String>) -> Self {
        self.guard = Some(guard.into());
        self
    }

    #[must_use]
    pub fn scope(mut self, scope: ScopeId) -> Self {
        self.scope = Some(scope);
        self
    }
}

/// Parameters for creating a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
    #[serde(default)]
    pub guard: Option<String>,
    #[serde(default)]
    pub owner_id: Option<PrincipalId>,
}

impl NewGroup {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn guard(mut self, guard: impl Into<String>) -> Self {
        self.guard = Some(guard.into());
        self
    }

    #[must_use]
    pub fn owner(mut self, owner_id: PrincipalId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }
}

/// Full permission/group graph as loaded from storage.
///
/// This is what the resolver caches; principal memberships are not part of it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    pub permissions: Vec<Permission>,
    pub groups: Vec<Group>,
    /// `(group, permission)` edges.
    pub group_permissions: Vec<(GroupId, PermissionId)>,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn group(owner_id: Option<PrincipalId>) -> Group {
        Group {
            id: Uuid::new_v4(),
            name: "editors".to_owned(),
            guard: "web".to_owned(),
            owner_id,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn group_with_owner_is_team() {
        let owner = Uuid::new_v4();
        let team = group(Some(owner));

        assert!(team.is_team());
        assert!(team.is_owned_by(owner));
        assert!(!team.is_owned_by(Uuid::new_v4()));
        assert!(!group(None).is_team());
    }

    #[test]
    fn principal_ref_key_uses_type_and_id() {
        let id = Uuid::new_v4();
        let admin = PrincipalRef::new("admin", id).with_guard("admin");

        assert_eq!(admin.key(), PrincipalKey::new("admin", id));
        assert_eq!(Principal::guard(&admin), Some("admin"));
        assert_eq!(Principal::guard(&PrincipalRef::new("user", id)), None);
    }

    #[test]
    fn permission_ref_conversions() {
        let id = Uuid::new_v4();
        assert_eq!(
            PermissionRef::from("edit-articles"),
            PermissionRef::ByName("edit-articles".to_owned())
        );
        assert_eq!(PermissionRef::from(id), PermissionRef::ById(id));
        assert_eq!(GroupRef::from("editors").describe(), "editors");
    }

    #[test]
    fn new_permission_builder() {
        let scope = Uuid::new_v4();
        let new = NewPermission::new("publish").guard("admin").scope(scope);

        assert_eq!(new.name, "publish");
        assert_eq!(new.guard.as_deref(), Some("admin"));
        assert_eq!(new.scope, Some(scope));
    }

    #[test]
    fn permission_serialization_skips_empty_scope() {
        let permission = Permission {
            id: Uuid::nil(),
            name: "edit".to_owned(),
            guard: "web".to_owned(),
            scope: None,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&permission).unwrap();
        assert!(json.get("scope").is_none());
        assert_eq!(json["guard"], "web");
    }
}
