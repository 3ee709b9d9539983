//! CLI configuration: a collector chain plus a static API key table.

use std::path::Path;

use anyhow::{Context, ensure};
use collector_chain::config::{ChainConfig, IdentityCollectorConfig, StaticUserConfig};
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use serde::Deserialize;

/// Prefix of environment overrides, e.g. `MULTIAUTH__CHAIN__...`.
pub const ENV_PREFIX: &str = "MULTIAUTH__";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub chain: ChainConfig,

    /// Keys accepted by the built-in `static` API key validator.
    pub api_keys: Vec<ApiKeyEntry>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            chain: ChainConfig {
                identity: vec![IdentityCollectorConfig::StaticUser(StaticUserConfig::default())],
                authorization: Vec::new(),
            },
            api_keys: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiKeyEntry {
    pub key: String,
    pub username: String,
    #[serde(default)]
    pub authorities: Vec<String>,
}

impl CliConfig {
    /// Load the YAML file at `path`, if any, then environment overrides.
    ///
    /// # Errors
    ///
    /// Fails if `path` does not exist or the merged configuration does not
    /// deserialize.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            ensure!(path.is_file(), "config file {} not found", path.display());
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("invalid configuration")
    }
}
