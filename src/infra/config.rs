//! Layered configuration: `whence.toml` in the repo, then `WHENCE_*`
//! environment overrides. Everything has a default so a bare checkout
//! works with no config at all.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::infra::store::DEFAULT_STORE_DIR;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Store directory name relative to the repository root.
    pub store_dir: String,

    /// Query-time tunables.
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Outward hash-search bound, in lines.
    pub search_radius: u32,

    /// Maximum rows printed per query; 0 means unlimited.
    pub limit: usize,

    /// Colour human output (`--no-color` still wins).
    pub color: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_dir: DEFAULT_STORE_DIR.to_string(),
            query: QueryConfig::default(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            search_radius: crate::core::verify::MAX_SEARCH,
            limit: 0,
            color: true,
        }
    }
}

/// Load config from the repository root, in priority order, then apply
/// `WHENCE_`-prefixed environment variables.
pub fn load_config(repo_root: &Path) -> Result<Config> {
    let mut builder = config::Config::builder();

    let config_paths = ["whence.toml", ".whence.toml", ".whence/config.toml"];
    for rel in &config_paths {
        let path = repo_root.join(rel);
        if path.exists() {
            builder = builder.add_source(config::File::from(path));
            break;
        }
    }

    builder = builder.add_source(config::Environment::with_prefix("WHENCE").separator("__"));

    let cfg = builder.build().context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

/// Write the default config next to the store so `enable` leaves an
/// editable template behind. Existing files are left alone.
pub fn write_default(repo_root: &Path, store_dir: &str) -> Result<()> {
    let path = repo_root.join(store_dir).join("config.toml");
    if path.exists() {
        return Ok(());
    }
    let toml_string =
        toml::to_string_pretty(&Config::default()).context("Failed to serialize default config")?;
    std::fs::write(&path, toml_string).context("Failed to write config file")?;
    Ok(())
}
