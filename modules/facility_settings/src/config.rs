//! Configuration for the facility settings module

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment prefix for overrides, e.g. `FACILITY_SETTINGS_CACHE_TTL=30s`
pub const ENV_PREFIX: &str = "FACILITY_SETTINGS_";

/// Facility settings configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// How long a cached settings tree is served before it is rebuilt
    #[serde(default = "default_cache_ttl", with = "humantime_serde")]
    pub cache_ttl: Duration,

    /// Directory holding `global`/`central` override files for the built-in defaults
    #[serde(default)]
    pub defaults_dir: Option<PathBuf>,

    /// Maximum serialized size of a value accepted by `set`, in bytes
    #[serde(default = "default_max_value_size")]
    pub max_value_size: usize,

    /// Days a soft-deleted setting row is kept before it is purged
    #[serde(default = "default_retention_days")]
    pub deleted_retention_days: u32,

    /// Country time zone seeded as `countryTimeZone` when a request has none
    #[serde(default)]
    pub country_time_zone: Option<String>,

    /// Address the REST server binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_ttl: default_cache_ttl(),
            defaults_dir: None,
            max_value_size: default_max_value_size(),
            deleted_retention_days: default_retention_days(),
            country_time_zone: None,
            bind_addr: default_bind_addr(),
        }
    }
}

impl Config {
    /// Defaults, then the YAML file (if given), then `FACILITY_SETTINGS_*` env vars
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::figment(path)
            .extract()
            .context("failed to load facility settings configuration")
    }

    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn deleted_retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.deleted_retention_days))
    }
}

fn default_cache_ttl() -> Duration {
    crate::domain::DEFAULT_TTL
}

fn default_max_value_size() -> usize {
    crate::domain::store::DEFAULT_MAX_VALUE_SIZE
}

fn default_retention_days() -> u32 {
    30
}

fn default_bind_addr() -> String {
    "127.0.0.1:8087".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.max_value_size, 1024 * 1024);
        assert_eq!(config.deleted_retention_days, 30);
        assert!(config.defaults_dir.is_none());
    }

    #[test]
    fn test_load_yaml_with_humantime_ttl() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "settings.yaml",
                "cache_ttl: 90s\ndefaults_dir: /etc/facility-settings\n",
            )?;
            let config: Config = Config::figment(Some(Path::new("settings.yaml"))).extract()?;
            assert_eq!(config.cache_ttl, Duration::from_secs(90));
            assert_eq!(
                config.defaults_dir.as_deref(),
                Some(Path::new("/etc/facility-settings"))
            );
            assert_eq!(config.deleted_retention_days, 30);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("settings.yaml", "max_value_size: 10\n")?;
            jail.set_env("FACILITY_SETTINGS_MAX_VALUE_SIZE", "2048");
            jail.set_env("FACILITY_SETTINGS_COUNTRY_TIME_ZONE", "Pacific/Auckland");
            let config: Config = Config::figment(Some(Path::new("settings.yaml"))).extract()?;
            assert_eq!(config.max_value_size, 2048);
            assert_eq!(config.country_time_zone.as_deref(), Some("Pacific/Auckland"));
            Ok(())
        });
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("settings.yaml", "cache_tll: 5s\n")?;
            let result: Result<Config, _> = Config::figment(Some(Path::new("settings.yaml"))).extract();
            assert!(result.is_err());
            Ok(())
        });
    }
}
