//! # Client configuration
//!
//! Read from the environment. Unset variables fall back to development defaults.

use std::{env::VarError, path::PathBuf};

use reqwest::Url;
use tracing::warn;

mod vars {
    pub const API_URL: &str = "AUTOTRIPS_API_URL";
    pub const DB_PATH: &str = "AUTOTRIPS_DB_PATH";
}

mod defaults {
    pub const API_URL: &str = "http://127.0.0.1:8000/api/v1";
    pub const DB_PATH: &str = "./autotrips.db";
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not valid UTF-8")]
    EnvNotUtf8(&'static str),

    #[error("{var} is not a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the backend API; endpoint paths are appended to it.
    pub api_url: Url,
    /// SQLite database holding the persisted tokens.
    pub db_path: PathBuf,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name))
    }

    /// Builds the configuration from `lookup`, which resolves variable names the way
    /// [`std::env::var`] does.
    pub fn from_lookup(
        lookup: impl Fn(&'static str) -> Result<String, VarError>,
    ) -> Result<Self, ConfigError> {
        let api_url = read(&lookup, vars::API_URL, defaults::API_URL)?;
        let api_url = Url::parse(&api_url).map_err(|source| ConfigError::InvalidUrl {
            var: vars::API_URL,
            source,
        })?;
        let db_path = PathBuf::from(read(&lookup, vars::DB_PATH, defaults::DB_PATH)?);
        Ok(Self { api_url, db_path })
    }
}

fn read(
    lookup: &impl Fn(&'static str) -> Result<String, VarError>,
    var: &'static str,
    default: &str,
) -> Result<String, ConfigError> {
    match lookup(var) {
        Ok(value) => Ok(value),
        Err(VarError::NotPresent) => {
            warn!("{var} not set; using default of {default}");
            Ok(default.to_string())
        }
        Err(VarError::NotUnicode(_)) => Err(ConfigError::EnvNotUtf8(var)),
    }
}
