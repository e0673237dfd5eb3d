//! Command implementations.

mod run;
mod validate;

pub use run::run_bridge;
pub use validate::run_validate;

use std::path::Path;

use config_loader::ConfigLoader;
use contracts::BridgeConfig;

use crate::error::Result;

/// Where the configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    Environment,
}

impl ConfigSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigSource::File => "file",
            ConfigSource::Environment => "environment",
        }
    }
}

/// Load from `path` when given, otherwise from the process environment
pub fn load_config(path: Option<&Path>) -> Result<(BridgeConfig, ConfigSource)> {
    match path {
        Some(path) => Ok((ConfigLoader::load_from_path(path)?, ConfigSource::File)),
        None => Ok((ConfigLoader::load_from_env()?, ConfigSource::Environment)),
    }
}
