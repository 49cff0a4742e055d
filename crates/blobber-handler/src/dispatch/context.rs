//! Builds the caller identity for a request from its route parameter and
//! identity headers.

use crate::domain::config::HeaderConfig;
use crate::domain::context::RequestIdentity;
use crate::domain::error::{ConfigError, HandlerError};
use crate::domain::operations::Operation;
use axum::http::{HeaderMap, HeaderName};

/// Extracts [`RequestIdentity`] values using the configured header names
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    client_header: HeaderName,
    client_key_header: HeaderName,
}

impl ContextBuilder {
    pub fn new(config: &HeaderConfig) -> Result<Self, ConfigError> {
        let client_header = HeaderName::from_bytes(config.client_id.as_bytes()).map_err(|_| {
            ConfigError::InvalidHeaderName {
                field: "client_id",
                value: config.client_id.clone(),
            }
        })?;
        let client_key_header =
            HeaderName::from_bytes(config.client_key.as_bytes()).map_err(|_| {
                ConfigError::InvalidHeaderName {
                    field: "client_key",
                    value: config.client_key.clone(),
                }
            })?;

        Ok(Self {
            client_header,
            client_key_header,
        })
    }

    /// Build the identity for one request.
    ///
    /// Absent headers become empty strings. Values are taken verbatim, without
    /// trimming or case folding. For operations that declare an allocation
    /// parameter a missing or empty value is rejected; for the others the
    /// allocation id is always empty.
    pub fn identity(
        &self,
        operation: Operation,
        allocation: Option<&str>,
        headers: &HeaderMap,
    ) -> Result<RequestIdentity, HandlerError> {
        let allocation_id = if operation.requires_allocation() {
            match allocation {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => {
                    return Err(HandlerError::invalid_parameters(
                        "missing allocation parameter",
                    ))
                }
            }
        } else {
            String::new()
        };

        let client_id = header_value(headers, &self.client_header)?;
        let client_public_key = header_value(headers, &self.client_key_header)?;

        Ok(RequestIdentity {
            allocation_id,
            client_id,
            client_public_key,
        })
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self {
            client_header: HeaderName::from_static("x-app-client-id"),
            client_key_header: HeaderName::from_static("x-app-client-key"),
        }
    }
}

/// First value of `name`, or empty if absent
fn header_value(headers: &HeaderMap, name: &HeaderName) -> Result<String, HandlerError> {
    match headers.get(name) {
        None => Ok(String::new()),
        Some(value) => std::str::from_utf8(value.as_bytes())
            .map(str::to_owned)
            .map_err(|_| {
                HandlerError::invalid_parameters(format!("header {} is not valid UTF-8", name))
            }),
    }
}
