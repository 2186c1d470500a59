//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check required values (server URL, at least one supplier)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Detect duplicate supplier ids
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{RelayConfig, Tenancy};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a fully loaded configuration.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server_url.is_empty() {
        errors.push(ValidationError::new("server_url", "SERVER_URL is required"));
    } else {
        match Url::parse(&config.server_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https" | "ws" | "wss") => {}
            Ok(url) => errors.push(ValidationError::new(
                "server_url",
                format!("unsupported scheme {:?}", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new("server_url", e.to_string())),
        }
    }

    if config.suppliers.is_empty() {
        errors.push(ValidationError::new(
            "suppliers",
            "SUPPLIER_ID and SUPPLIER_CODE (or SUPPLIERS) are required",
        ));
    }
    if config.tenancy == Tenancy::Single && config.suppliers.len() > 1 {
        errors.push(ValidationError::new(
            "suppliers",
            "single-tenant mode serves exactly one supplier",
        ));
    }

    let mut seen = HashSet::new();
    for (i, supplier) in config.suppliers.iter().enumerate() {
        if supplier.id.is_empty() || supplier.code.is_empty() {
            errors.push(ValidationError::new(
                format!("suppliers[{}]", i),
                "id and code must be non-empty",
            ));
        }
        if !seen.insert(supplier.id.as_str()) {
            errors.push(ValidationError::new(
                format!("suppliers[{}]", i),
                format!("duplicate supplier id {:?}", supplier.id),
            ));
        }
    }

    if let Err(e) = Url::parse(config.local_api_base()) {
        errors.push(ValidationError::new("local_api.base_url", e.to_string()));
    }

    if !config.channel.namespace.starts_with('/') {
        errors.push(ValidationError::new("channel.namespace", "must start with '/'"));
    }
    if config.channel.reconnect_delay_ms == 0 {
        errors.push(ValidationError::new("channel.reconnect_delay_ms", "must be > 0"));
    }

    for (field, secs) in [
        ("timeouts.local_api_secs", config.timeouts.local_api_secs),
        ("timeouts.callback_secs", config.timeouts.callback_secs),
        ("timeouts.reply_secs", config.timeouts.reply_secs),
    ] {
        if secs == 0 {
            errors.push(ValidationError::new(field, "must be > 0"));
        }
    }

    if config.receiver.enabled && config.receiver.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "receiver.bind_address",
            format!("{:?} is not a socket address", config.receiver.bind_address),
        ));
    }

    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "observability.metrics_address",
                format!("{:?} is not a socket address", addr),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
