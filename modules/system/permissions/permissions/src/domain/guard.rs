//! Guard registry: which guards a principal may act in.

use std::collections::BTreeMap;

use permissions_sdk::Principal;

use super::error::DomainError;
use crate::config::PermissionsConfig;

/// Static guard name to principal type mapping, built once at startup.
#[derive(Debug, Clone)]
pub struct GuardRegistry {
    default_guard: String,
    guards: BTreeMap<String, String>,
}

impl GuardRegistry {
    #[must_use]
    pub fn new(default_guard: impl Into<String>, guards: BTreeMap<String, String>) -> Self {
        Self {
            default_guard: default_guard.into(),
            guards,
        }
    }

    #[must_use]
    pub fn from_config(cfg: &PermissionsConfig) -> Self {
        Self::new(cfg.default_guard.clone(), cfg.guards.clone())
    }

    #[must_use]
    pub fn default_guard(&self) -> &str {
        &self.default_guard
    }

    /// The given guard, or the configured default.
    #[must_use]
    pub fn resolve(&self, guard: Option<&str>) -> String {
        guard.unwrap_or(&self.default_guard).to_owned()
    }

    /// Guards the principal may act in, in name order.
    ///
    /// An explicit guard on the principal wins. Otherwise every guard mapped
    /// to the principal's type; a type with no mapping falls back to the
    /// default guard.
    #[must_use]
    pub fn guards_for(&self, principal: &dyn Principal) -> Vec<String> {
        if let Some(guard) = principal.guard() {
            return vec![guard.to_owned()];
        }

        let mapped: Vec<String> = self
            .guards
            .iter()
            .filter(|(_, principal_type)| principal_type.as_str() == principal.principal_type())
            .map(|(guard, _)| guard.clone())
            .collect();

        if mapped.is_empty() {
            vec![self.default_guard.clone()]
        } else {
            mapped
        }
    }

    /// Guard used to resolve names on behalf of the principal: the configured
    /// default if it is one of the principal's guards, otherwise its first guard.
    #[must_use]
    pub fn default_guard_for(&self, principal: &dyn Principal) -> String {
        let guards = self.guards_for(principal);
        if guards.iter().any(|g| *g == self.default_guard) {
            return self.default_guard.clone();
        }
        guards
            .into_iter()
            .next()
            .unwrap_or_else(|| self.default_guard.clone())
    }

    /// Fail with `GuardMismatch` unless `guard` is one of the principal's guards.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::GuardMismatch`] carrying the principal's guards.
    pub fn ensure_shared(&self, principal: &dyn Principal, guard: &str) -> Result<(), DomainError> {
        let expected = self.guards_for(principal);
        if expected.iter().any(|g| g == guard) {
            Ok(())
        } else {
            Err(DomainError::GuardMismatch {
                given: guard.to_owned(),
                expected,
            })
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use permissions_sdk::PrincipalRef;
    use uuid::Uuid;

    fn registry() -> GuardRegistry {
        GuardRegistry::new(
            "web",
            BTreeMap::from([
                ("web".to_owned(), "user".to_owned()),
                ("api".to_owned(), "user".to_owned()),
                ("admin".to_owned(), "admin".to_owned()),
            ]),
        )
    }

    #[test]
    fn guards_follow_principal_type() {
        let reg = registry();
        let user = PrincipalRef::new("user", Uuid::new_v4());
        let admin = PrincipalRef::new("admin", Uuid::new_v4());

        assert_eq!(reg.guards_for(&user), ["api", "web"]);
        assert_eq!(reg.default_guard_for(&user), "web");
        assert_eq!(reg.guards_for(&admin), ["admin"]);
        assert_eq!(reg.default_guard_for(&admin), "admin");
    }

    #[test]
    fn explicit_guard_wins() {
        let reg = registry();
        let user = PrincipalRef::new("user", Uuid::new_v4()).with_guard("api");

        assert_eq!(reg.guards_for(&user), ["api"]);
        assert_eq!(reg.default_guard_for(&user), "api");
    }

    #[test]
    fn unmapped_type_uses_default_guard() {
        let reg = registry();
        let bot = PrincipalRef::new("bot", Uuid::new_v4());

        assert_eq!(reg.guards_for(&bot), ["web"]);
        assert!(reg.ensure_shared(&bot, "web").is_ok());
    }

    #[test]
    fn mismatch_reports_valid_guards() {
        let reg = registry();
        let admin = PrincipalRef::new("admin", Uuid::new_v4());

        match reg.ensure_shared(&admin, "web") {
            Err(DomainError::GuardMismatch { given, expected }) => {
                assert_eq!(given, "web");
                assert_eq!(expected, ["admin"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
