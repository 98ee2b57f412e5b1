//! Error types for the permissions module.

use std::fmt;

use thiserror::Error;

/// Which registry entity an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Permission,
    Group,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permission => f.write_str("permission"),
            Self::Group => f.write_str("group"),
        }
    }
}

/// Errors surfaced by the permissions API.
///
/// Only mutations and explicit lookups return these. Authorization checks
/// never fail: an unresolvable permission or group is reported as "not granted".
#[derive(Debug, Error)]
pub enum PermissionsError {
    /// A permission `(name, guard, scope)` or group `(name, guard)` already exists.
    #[error("{kind} `{name}` already exists for guard `{guard}`")]
    AlreadyExists {
        kind: EntityKind,
        name: String,
        guard: String,
    },

    /// An explicit lookup found nothing.
    #[error("{kind} `{reference}` does not exist")]
    NotFound { kind: EntityKind, reference: String },

    /// A permission or group was associated with a principal or group of another guard.
    #[error("the given group or permission should use guard `{}` instead of `{given}`", expected.join(", "))]
    GuardMismatch { given: String, expected: Vec<String> },

    /// The principal does not belong to the target group.
    #[error("principal is not a member of group `{group}`")]
    NotAMember { group: String },

    /// The backing store could not be reached within the configured timeout.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PermissionsError {
    #[must_use]
    pub fn not_found(kind: EntityKind, reference: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            reference: reference.into(),
        }
    }

    #[must_use]
    pub fn guard_mismatch(given: impl Into<String>, expected: Vec<String>) -> Self {
        Self::GuardMismatch {
            given: given.into(),
            expected,
        }
    }
}

/// Errors reported by storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A referenced row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend is unreachable.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("storage error: {0}")]
    Internal(String),
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn guard_mismatch_lists_expected_guards() {
        let err = PermissionsError::guard_mismatch("admin", vec!["web".to_owned(), "api".to_owned()]);
        assert_eq!(
            err.to_string(),
            "the given group or permission should use guard `web, api` instead of `admin`"
        );
    }

    #[test]
    fn already_exists_names_entity() {
        let err = PermissionsError::AlreadyExists {
            kind: EntityKind::Permission,
            name: "edit-articles".to_owned(),
            guard: "web".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "permission `edit-articles` already exists for guard `web`"
        );
    }

    #[test]
    fn not_found_names_entity() {
        let err = PermissionsError::not_found(EntityKind::Group, "editors");
        assert_eq!(err.to_string(), "group `editors` does not exist");
    }
}
