//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use serde::de::value::{Error as ValueError, StrDeserializer};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::config::schema::{RelayConfig, SupplierIdentity, Tenancy};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("SUPPLIERS is not valid (expected id:code,id2:code2): {0:?}")]
    InvalidSuppliers(String),

    #[error("{key} has an invalid value {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file and the process environment.
pub fn load_config(path: Option<&Path>) -> Result<RelayConfig, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`], reading variables through `env`.
pub fn load_config_with<F>(path: Option<&Path>, env: F) -> Result<RelayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => RelayConfig::default(),
    };

    apply_env(&mut config, &env)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables on top of file values.
fn apply_env<F>(config: &mut RelayConfig, env: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(url) = var("SERVER_URL") {
        config.server_url = url.trim_end_matches('/').to_string();
    }

    if let Some(raw) = var("SUPPLIERS") {
        let suppliers = parse_suppliers(&raw);
        if suppliers.is_empty() {
            return Err(ConfigError::InvalidSuppliers(raw));
        }
        config.suppliers = suppliers;
        config.tenancy = Tenancy::Multi;
    } else {
        match (var("SUPPLIER_ID"), var("SUPPLIER_CODE")) {
            (Some(id), Some(code)) => {
                config.suppliers = vec![SupplierIdentity::new(id, code)];
                config.tenancy = Tenancy::Single;
            }
            (Some(_), None) => return Err(ConfigError::Missing("SUPPLIER_CODE")),
            (None, Some(_)) => return Err(ConfigError::Missing("SUPPLIER_ID")),
            (None, None) => {}
        }
    }

    if let Some(base) = var("LOCAL_API") {
        config.local_api.base_url = base.trim_end_matches('/').to_string();
    }
    if let Some(mode) = var("LOCAL_API_MODE") {
        config.local_api.mode = Some(parse_enum("LOCAL_API_MODE", &mode)?);
    }
    if let Some(route) = var("CALLBACK_ROUTE") {
        config.callback.route = Some(parse_enum("CALLBACK_ROUTE", &route)?);
    }
    if let Some(credential) = var("CHANNEL_CREDENTIAL") {
        config.channel.credential = Some(parse_enum("CHANNEL_CREDENTIAL", &credential)?);
    }
    if let Some(port) = var("CALLBACK_PORT") {
        let port: u16 = port.parse().map_err(|_| ConfigError::InvalidValue {
            key: "CALLBACK_PORT",
            value: port.clone(),
        })?;
        config.receiver.bind_address = format!("0.0.0.0:{}", port);
    }
    if let Some(ack) = var("CALLBACK_ACK") {
        config.receiver.ack = parse_enum("CALLBACK_ACK", &ack)?;
    }
    if let Some(addr) = var("METRICS_ADDRESS") {
        config.observability.metrics_address = Some(addr);
    }
    if let Some(level) = var("LOG_LEVEL") {
        config.observability.log_level = level;
    }
    if let Some(format) = var("LOG_FORMAT") {
        config.observability.log_format = parse_enum("LOG_FORMAT", &format)?;
    }

    Ok(())
}

/// Parse `id:code,id2:code2`. Entries missing either half are skipped.
pub fn parse_suppliers(raw: &str) -> Vec<SupplierIdentity> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let mut parts = pair.split(':');
            let id = parts.next().map(str::trim).unwrap_or_default();
            let code = parts.next().map(str::trim).unwrap_or_default();
            if id.is_empty() || code.is_empty() {
                tracing::warn!(entry = %pair, "Skipping malformed SUPPLIERS entry");
                return None;
            }
            Some(SupplierIdentity::new(id, code))
        })
        .collect()
}

/// Parse a kebab-case enum value through its serde representation.
fn parse_enum<T: DeserializeOwned>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    let normalized = value.to_ascii_lowercase().replace('_', "-");
    T::deserialize(StrDeserializer::<ValueError>::new(&normalized)).map_err(|_| {
        ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{CallbackRoute, LocalApiMode};
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_single_tenant_env() {
        let config = load_config_with(
            None,
            env_of(&[
                ("SERVER_URL", "http://pusat:3000/"),
                ("SUPPLIER_ID", "cltAAA"),
                ("SUPPLIER_CODE", "PC_A"),
                ("CALLBACK_PORT", "7000"),
            ]),
        )
        .unwrap();

        assert_eq!(config.tenancy, Tenancy::Single);
        assert_eq!(config.server_url, "http://pusat:3000");
        assert_eq!(config.suppliers, vec![SupplierIdentity::new("cltAAA", "PC_A")]);
        assert_eq!(config.receiver.bind_address, "0.0.0.0:7000");
        assert_eq!(config.local_api_mode(), LocalApiMode::LegacyPath);
    }

    #[test]
    fn test_multi_tenant_env() {
        let config = load_config_with(
            None,
            env_of(&[
                ("SERVER_URL", "http://pusat:3000"),
                ("SUPPLIERS", "cltAAA:PC_A, cltBBB:PC_B,broken,:PC_C"),
                ("LOCAL_API_MODE", "legacy_path"),
            ]),
        )
        .unwrap();

        assert_eq!(config.tenancy, Tenancy::Multi);
        assert_eq!(config.suppliers.len(), 2);
        assert_eq!(config.suppliers[1], SupplierIdentity::new("cltBBB", "PC_B"));
        assert_eq!(config.local_api_mode(), LocalApiMode::LegacyPath);
        assert_eq!(config.callback_route(), CallbackRoute::Query);
    }

    #[test]
    fn test_missing_server_url_is_fatal() {
        let err = load_config_with(
            None,
            env_of(&[("SUPPLIER_ID", "cltAAA"), ("SUPPLIER_CODE", "PC_A")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("server_url"));
    }

    #[test]
    fn test_half_identity_is_fatal() {
        let err = load_config_with(
            None,
            env_of(&[("SERVER_URL", "http://pusat"), ("SUPPLIER_ID", "cltAAA")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SUPPLIER_CODE")));
    }

    #[test]
    fn test_empty_suppliers_is_fatal() {
        let err = load_config_with(
            None,
            env_of(&[("SERVER_URL", "http://pusat"), ("SUPPLIERS", "nope,,x:")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSuppliers(_)));
    }

    #[test]
    fn test_invalid_enum_value() {
        let err = load_config_with(
            None,
            env_of(&[
                ("SERVER_URL", "http://pusat"),
                ("SUPPLIERS", "a:b"),
                ("CALLBACK_ROUTE", "carrier-pigeon"),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "CALLBACK_ROUTE", .. }));
    }

    #[test]
    fn test_file_then_env_overlay() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            server_url = "http://from-file:3000"
            tenancy = "multi"

            [[suppliers]]
            id = "cltFILE"
            code = "PC_FILE"

            [timeouts]
            reply_secs = 60
            "#
        )
        .unwrap();

        let config = load_config_with(
            Some(file.path()),
            env_of(&[("SERVER_URL", "http://from-env:3000")]),
        )
        .unwrap();

        assert_eq!(config.server_url, "http://from-env:3000");
        assert_eq!(config.suppliers[0].code, "PC_FILE");
        assert_eq!(config.timeouts.reply_secs, 60);
    }
}
