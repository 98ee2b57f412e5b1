#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Permissions SDK
//!
//! This crate provides the public API for the `permissions` module:
//!
//! - [`PermissionsClient`] - Query and mutation API for consumers
//! - [`Principal`], [`PrincipalRef`], [`PrincipalKey`] - Principal abstraction
//! - [`Permission`], [`Group`], [`Membership`], [`DirectGrant`] - Domain models
//! - [`PermissionRef`], [`GroupRef`] - Typed references resolved at the API boundary
//! - [`GroupNames`] - Group list parsed from lists or pipe/comma-delimited strings
//! - [`IdentityStore`], [`PermissionHolderStore`], [`GroupMemberStore`] - Storage contract
//! - [`PermissionsError`], [`StoreError`] - Error types
//!
//! ## Usage
//!
//! ```ignore
//! use permissions_sdk::{NewGroup, NewPermission, PermissionsClient, PrincipalRef};
//!
//! let perms: Arc<dyn PermissionsClient> = module.init(cfg, store)?;
//!
//! let edit = perms.create_permission(NewPermission::new("edit-articles")).await?;
//! let editors = perms.create_group(NewGroup::new("editors")).await?;
//! perms.attach_permission_to_group(editors.into(), edit.into(), None).await?;
//!
//! let user = PrincipalRef::new("user", user_id);
//! perms.join_group(&user, "editors".into(), None, None).await?;
//!
//! assert!(perms.can(&user, "edit-articles").await);
//! ```

pub mod api;
pub mod error;
pub mod group_names;
pub mod models;
pub mod store_api;

// Re-export main types at crate root
pub use api::PermissionsClient;
pub use error::{EntityKind, PermissionsError, StoreError};
pub use group_names::GroupNames;
pub use models::{
    DirectGrant, Group, GroupId, GroupRef, IdentitySnapshot, Membership, NewGroup, NewPermission,
    Permission, PermissionId, PermissionRef, Principal, PrincipalId, PrincipalKey, PrincipalRef,
    ScopeId,
};
pub use store_api::{GroupMemberStore, IdentityStore, PermissionHolderStore, PermissionStore};
