//! Domain layer for the permissions module.

pub mod cache;
pub mod context;
pub mod error;
pub mod guard;
pub mod local_client;
pub mod membership;
pub mod registry;
pub mod resolver;
pub mod service;
pub mod storage;

pub use cache::{PermissionGraph, PermissionGraphCache};
pub use error::DomainError;
pub use guard::GuardRegistry;
pub use local_client::PermissionsLocalClient;
pub use service::Service;
