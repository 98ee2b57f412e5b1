//! Permissions Module
//!
//! Guard-isolated permission, group and membership resolver. Decides whether
//! a principal holds a permission by combining direct grants with grants
//! derived from group membership, optionally scoped per team.
//!
//! The permission graph is cached and invalidated synchronously by every
//! mutation; memberships and direct grants are read from storage per check.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;
pub mod infra;
pub mod module;

pub use config::PermissionsConfig;
pub use infra::storage::InMemoryPermissionStore;
pub use module::PermissionsModule;
