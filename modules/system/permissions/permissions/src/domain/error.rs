//! Domain errors for the permissions module.

use std::time::Duration;

use permissions_sdk::{EntityKind, PermissionsError, ScopeId, StoreError};

/// Internal domain errors.
#[derive(thiserror::Error, Debug)]
pub enum DomainError {
    #[error("permission `{name}` already exists for guard `{guard}`")]
    PermissionAlreadyExists {
        name: String,
        guard: String,
        scope: Option<ScopeId>,
    },

    #[error("group `{name}` already exists for guard `{guard}`")]
    GroupAlreadyExists { name: String, guard: String },

    #[error("permission `{reference}` does not exist")]
    PermissionNotFound { reference: String },

    #[error("group `{reference}` does not exist")]
    GroupNotFound { reference: String },

    #[error("guard `{given}` is not one of [{}]", expected.join(", "))]
    GuardMismatch { given: String, expected: Vec<String> },

    #[error("principal is not a member of group `{group}`")]
    NotAMember { group: String },

    #[error("storage call `{operation}` timed out after {timeout:?}")]
    StorageTimeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl DomainError {
    pub(crate) fn permission_not_found(reference: impl Into<String>) -> Self {
        Self::PermissionNotFound {
            reference: reference.into(),
        }
    }

    pub(crate) fn group_not_found(reference: impl Into<String>) -> Self {
        Self::GroupNotFound {
            reference: reference.into(),
        }
    }

    /// Whether the backing store could not be reached.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::StorageTimeout { .. } | Self::Storage(StoreError::Unavailable(_))
        )
    }
}

impl From<DomainError> for PermissionsError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::PermissionAlreadyExists { name, guard, .. } => Self::AlreadyExists {
                kind: EntityKind::Permission,
                name,
                guard,
            },
            DomainError::GroupAlreadyExists { name, guard } => Self::AlreadyExists {
                kind: EntityKind::Group,
                name,
                guard,
            },
            DomainError::PermissionNotFound { reference } => {
                Self::not_found(EntityKind::Permission, reference)
            }
            DomainError::GroupNotFound { reference } => Self::not_found(EntityKind::Group, reference),
            DomainError::GuardMismatch { given, expected } => Self::guard_mismatch(given, expected),
            DomainError::NotAMember { group } => Self::NotAMember { group },
            e @ (DomainError::StorageTimeout { .. }
            | DomainError::Storage(StoreError::Unavailable(_))) => {
                Self::StorageUnavailable(e.to_string())
            }
            DomainError::Storage(e) => Self::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn timeout_maps_to_storage_unavailable() {
        let err = DomainError::StorageTimeout {
            operation: "load_snapshot",
            timeout: Duration::from_millis(50),
        };
        assert!(err.is_unavailable());
        assert!(matches!(
            PermissionsError::from(err),
            PermissionsError::StorageUnavailable(msg) if msg.contains("load_snapshot")
        ));
    }

    #[test]
    fn store_conflict_maps_to_internal() {
        let err = DomainError::from(StoreError::Conflict("dup".to_owned()));
        assert!(!err.is_unavailable());
        assert!(matches!(
            PermissionsError::from(err),
            PermissionsError::Internal(_)
        ));
    }

    #[test]
    fn guard_mismatch_keeps_expected_guards() {
        let err = DomainError::GuardMismatch {
            given: "admin".to_owned(),
            expected: vec!["web".to_owned()],
        };
        match PermissionsError::from(err) {
            PermissionsError::GuardMismatch { given, expected } => {
                assert_eq!(given, "admin");
                assert_eq!(expected, ["web"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
