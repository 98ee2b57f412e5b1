//! Configuration for the permissions module.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use serde::{Deserialize, Deserializer};

/// Environment variable prefix. Nested keys use `__`, e.g.
/// `PERMISSIONS_GUARDS__ADMIN=admin`.
pub const ENV_PREFIX: &str = "PERMISSIONS_";

/// Permissions module configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PermissionsConfig {
    /// Guard used when a permission or group is created without one, and
    /// for principals whose type has no configured guard.
    pub default_guard: String,

    /// Guard name to principal type (e.g. `web: user`, `admin: admin`).
    pub guards: BTreeMap<String, String>,

    /// How long a built permission graph stays valid (e.g. `"24h"`).
    #[serde(deserialize_with = "deserialize_duration")]
    pub cache_ttl: Duration,

    /// Upper bound on every storage call (e.g. `"5s"`).
    #[serde(deserialize_with = "deserialize_duration")]
    pub storage_timeout: Duration,

    /// Role label given to the creator of an owned group.
    pub owner_role: String,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            default_guard: "web".to_owned(),
            guards: BTreeMap::from([("web".to_owned(), "user".to_owned())]),
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            storage_timeout: Duration::from_secs(5),
            owner_role: "Owner".to_owned(),
        }
    }
}

impl PermissionsConfig {
    /// Load configuration from an optional YAML file, overlaid with
    /// `PERMISSIONS_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed, a value has the wrong
    /// shape, or the result fails [`Self::validate`].
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }

        let cfg: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns an error if a guard name is empty, the default guard is not
    /// configured, or a duration is zero.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.default_guard.trim().is_empty(),
            "default_guard must not be empty"
        );
        if let Some((guard, _)) = self
            .guards
            .iter()
            .find(|(guard, principal_type)| guard.trim().is_empty() || principal_type.trim().is_empty())
        {
            anyhow::bail!("guard `{guard}` has an empty name or principal type");
        }
        anyhow::ensure!(
            self.guards.contains_key(&self.default_guard),
            "default_guard `{}` is not listed in guards",
            self.default_guard
        );
        anyhow::ensure!(!self.cache_ttl.is_zero(), "cache_ttl must be greater than zero");
        anyhow::ensure!(
            !self.storage_timeout.is_zero(),
            "storage_timeout must be greater than zero"
        );
        Ok(())
    }
}

/// Accepts humantime strings (`"90s"`, `"24h"`) or a bare number of seconds.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => humantime::parse_duration(text.trim()).map_err(serde::de::Error::custom),
    }
}
