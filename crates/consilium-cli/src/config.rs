//! `consilium.yaml` loading.

use std::fs;
use std::path::Path;

use anyhow::Context;
use consilium_core::RolePolicy;
use serde::Deserialize;
use tracing::debug;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub credit: CreditConfig,
}

/// `credit:` section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CreditConfig {
    pub pr_merged: RolePolicy,
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document is valid and means defaults.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    /// Reads `path`; a missing file yields the defaults. The policy is validated.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config = if path.exists() {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            Self::from_yaml(&text)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        config
            .credit
            .pr_merged
            .validate()
            .with_context(|| format!("invalid credit.pr_merged in {}", path.display()))?;
        Ok(config)
    }
}
