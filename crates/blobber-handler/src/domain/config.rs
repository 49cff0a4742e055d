//! Handler configuration with validation.

use crate::domain::error::ConfigError;
use axum::http::HeaderName;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default header carrying the caller's client id
pub const CLIENT_HEADER: &str = "X-App-Client-ID";
/// Default header carrying the caller's public key
pub const CLIENT_KEY_HEADER: &str = "X-App-Client-Key";

/// Main handler configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// HTTP server configuration
    pub http: HttpConfig,
    /// Identity header names
    pub headers: HeaderConfig,
    /// Timeout configuration
    pub timeouts: TimeoutConfig,
    /// Request limits
    pub limits: LimitsConfig,
    /// CORS configuration
    pub cors: CorsConfig,
}

impl HandlerConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        HeaderName::from_bytes(self.headers.client_id.as_bytes()).map_err(|_| {
            ConfigError::InvalidHeaderName {
                field: "client_id",
                value: self.headers.client_id.clone(),
            }
        })?;
        HeaderName::from_bytes(self.headers.client_key.as_bytes()).map_err(|_| {
            ConfigError::InvalidHeaderName {
                field: "client_key",
                value: self.headers.client_key.clone(),
            }
        })?;

        // Header names are case-insensitive on the wire
        if self
            .headers
            .client_id
            .eq_ignore_ascii_case(&self.headers.client_key)
        {
            return Err(ConfigError::DuplicateHeaders);
        }

        if self.limits.max_request_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_request_size cannot be 0".into(),
            ));
        }

        if self.timeouts.default.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "default timeout cannot be 0".into(),
            ));
        }
        if self.timeouts.upload.is_zero() || self.timeouts.download.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "transfer timeouts cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 5051)
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 5051,
        }
    }
}

/// Names of the caller identity headers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    pub client_id: String,
    pub client_key: String,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            client_id: CLIENT_HEADER.to_string(),
            client_key: CLIENT_KEY_HEADER.to_string(),
        }
    }
}

/// Timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Metadata, listing, path and allocation lookups
    #[serde(with = "humantime_serde")]
    pub default: Duration,
    /// File upload and write commit
    #[serde(with = "humantime_serde")]
    pub upload: Duration,
    /// File download
    #[serde(with = "humantime_serde")]
    pub download: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(10),
            upload: Duration::from_secs(120),
            download: Duration::from_secs(60),
        }
    }
}

/// Request limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Max request body size in bytes (default: 64MB)
    pub max_request_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_size: 64 * 1024 * 1024,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Enable CORS
    pub enabled: bool,
    /// Allowed origins ("*" for all)
    pub allowed_origins: Vec<String>,
    /// Allowed methods
    pub allowed_methods: Vec<String>,
    /// Allowed headers ("*" for all); the identity headers are always added
    pub allowed_headers: Vec<String>,
    /// Max age for preflight cache
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec![
                "GET".to_string(),
                "POST".to_string(),
                "PUT".to_string(),
                "DELETE".to_string(),
                "OPTIONS".to_string(),
            ],
            allowed_headers: vec!["Content-Type".to_string()],
            max_age: 86400, // 24 hours
        }
    }
}
