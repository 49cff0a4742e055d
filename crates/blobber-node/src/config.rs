//! Configuration loading: file first, then environment overrides.

use blobber_handler::{ConfigError, HandlerConfig};
use std::net::IpAddr;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

/// Path of an optional JSON configuration file
pub const CONFIG_FILE_ENV: &str = "BLOBBER_CONFIG";
/// Bind address override
pub const HTTP_HOST_ENV: &str = "BLOBBER_HTTP_HOST";
/// Port override
pub const HTTP_PORT_ENV: &str = "BLOBBER_HTTP_PORT";

#[derive(Debug, Error)]
pub enum NodeConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Load configuration from the process environment
pub fn load_config() -> Result<HandlerConfig, NodeConfigError> {
    load_config_with(|name| std::env::var(name).ok())
}

/// Load configuration using `env` to look up variables
pub fn load_config_with<F>(env: F) -> Result<HandlerConfig, NodeConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match env(CONFIG_FILE_ENV) {
        Some(path) => {
            let path = PathBuf::from(path);
            let raw = std::fs::read_to_string(&path).map_err(|source| NodeConfigError::Read {
                path: path.clone(),
                source,
            })?;
            let config = serde_json::from_str(&raw)
                .map_err(|source| NodeConfigError::Parse { path: path.clone(), source })?;
            info!(path = %path.display(), "Loaded configuration file");
            config
        }
        None => HandlerConfig::default(),
    };

    if let Some(host) = env(HTTP_HOST_ENV) {
        config.http.host = host
            .parse::<IpAddr>()
            .map_err(|_| NodeConfigError::InvalidEnv {
                var: HTTP_HOST_ENV,
                value: host.clone(),
            })?;
    }
    if let Some(port) = env(HTTP_PORT_ENV) {
        config.http.port = port.parse().map_err(|_| NodeConfigError::InvalidEnv {
            var: HTTP_PORT_ENV,
            value: port.clone(),
        })?;
    }

    config.validate()?;
    Ok(config)
}
