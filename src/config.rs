use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::num::{NonZeroU32, NonZeroUsize};
use std::time::Duration;

use crate::cache::DEFAULT_CAPACITY;
use crate::decorator::{ResolvePolicy, DEFAULT_POD_INFRA_IMAGE};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Docker daemon address; local defaults when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_host: Option<String>,
    pub pod_infra_image: String,
    pub cache_capacity: NonZeroUsize,
    pub resolve: ResolveConfig,
    pub inventory: InventoryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolveConfig {
    pub max_attempts: NonZeroU32,
    pub interval_ms: u64,
}

/// Connection parameters of the inventory API.
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct InventoryConfig {
    pub url: String,
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for InventoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryConfig")
            .field("url", &self.url)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let policy = ResolvePolicy::default();
        Self {
            docker_host: None,
            pod_infra_image: DEFAULT_POD_INFRA_IMAGE.into(),
            cache_capacity: DEFAULT_CAPACITY,
            resolve: ResolveConfig {
                max_attempts: policy.max_attempts,
                interval_ms: policy.interval.as_millis() as u64,
            },
            inventory: InventoryConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config: Config = Self::figment()
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
        config.validate()
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("podnet.toml"))
            .merge(Env::prefixed("PODNET_").split("__"))
            // CATTLE_URL, CATTLE_ACCESS_KEY and CATTLE_SECRET_KEY
            .merge(
                Env::prefixed("CATTLE_")
                    .only(&["url", "access_key", "secret_key"])
                    .map(|key| format!("inventory.{}", key.as_str()).into()),
            )
    }

    fn validate(self) -> anyhow::Result<Self> {
        if self.inventory.url.is_empty() {
            anyhow::bail!("Inventory URL is not set (CATTLE_URL)");
        }
        Ok(self)
    }

    pub fn resolve_policy(&self) -> ResolvePolicy {
        ResolvePolicy {
            max_attempts: self.resolve.max_attempts,
            interval: Duration::from_millis(self.resolve.interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_with_inventory_from_cattle_env() {
        Jail::expect_with(|jail| {
            jail.set_env("CATTLE_URL", "http://cattle:8080/v1");
            jail.set_env("CATTLE_ACCESS_KEY", "ak");
            jail.set_env("CATTLE_SECRET_KEY", "sk");

            let config = Config::load().map_err(|e| e.to_string())?;
            assert_eq!(config.inventory.url, "http://cattle:8080/v1");
            assert_eq!(config.inventory.access_key, "ak");
            assert_eq!(config.inventory.secret_key, "sk");
            assert_eq!(config.pod_infra_image, DEFAULT_POD_INFRA_IMAGE);
            assert_eq!(config.cache_capacity.get(), 256);
            assert_eq!(config.resolve_policy(), ResolvePolicy::default());
            assert_eq!(config.docker_host, None);
            Ok(())
        });
    }

    #[test]
    fn file_and_prefixed_env_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "podnet.toml",
                r#"
                    pod_infra_image = "registry.local/pause:3.9"
                    cache_capacity = 64

                    [inventory]
                    url = "http://from-file/v1"

                    [resolve]
                    max_attempts = 10
                "#,
            )?;
            jail.set_env("PODNET_RESOLVE__INTERVAL_MS", "50");
            jail.set_env("PODNET_DOCKER_HOST", "unix:///run/docker.sock");

            let config = Config::load().map_err(|e| e.to_string())?;
            assert_eq!(config.pod_infra_image, "registry.local/pause:3.9");
            assert_eq!(config.cache_capacity.get(), 64);
            assert_eq!(config.inventory.url, "http://from-file/v1");
            assert_eq!(config.docker_host.as_deref(), Some("unix:///run/docker.sock"));
            assert_eq!(
                config.resolve_policy(),
                ResolvePolicy {
                    max_attempts: NonZeroU32::new(10).unwrap(),
                    interval: Duration::from_millis(50),
                }
            );
            Ok(())
        });
    }

    #[test]
    fn missing_inventory_url_is_rejected() {
        Jail::expect_with(|_jail| {
            let err = Config::load().unwrap_err();
            assert!(err.to_string().contains("CATTLE_URL"));
            Ok(())
        });
    }

    #[test]
    fn zero_cache_capacity_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("CATTLE_URL", "http://cattle/v1");
            jail.set_env("PODNET_CACHE_CAPACITY", "0");
            assert!(Config::load().is_err());
            Ok(())
        });
    }

    #[test]
    fn zero_attempts_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("CATTLE_URL", "http://cattle/v1");
            jail.set_env("PODNET_RESOLVE__MAX_ATTEMPTS", "0");
            assert!(Config::load().is_err());
            Ok(())
        });
    }

    #[test]
    fn secret_key_is_not_printed() {
        let config = InventoryConfig {
            url: "http://cattle/v1".into(),
            access_key: "ak".into(),
            secret_key: "hunter2".into(),
        };
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
