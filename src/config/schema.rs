//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files;
//! environment variables are layered on top by the loader.

use serde::{Deserialize, Serialize};

/// Root configuration for the supplier relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Base URL of the central server (e.g., "https://pusat.example.com").
    pub server_url: String,

    /// Supplier identities served by this process.
    pub suppliers: Vec<SupplierIdentity>,

    /// Single-tenant (one identity) or multi-tenant deployment.
    pub tenancy: Tenancy,

    /// Local API settings.
    pub local_api: LocalApiConfig,

    /// Persistent channel settings.
    pub channel: ChannelConfig,

    /// Callback delivery settings.
    pub callback: CallbackConfig,

    /// Legacy callback receiver settings.
    pub receiver: ReceiverConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl RelayConfig {
    /// Supplier code used when a caller does not name one.
    pub fn default_supplier_code(&self) -> Option<&str> {
        self.suppliers.first().map(|s| s.code.as_str())
    }
}

/// A supplier this relay speaks for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct SupplierIdentity {
    /// Identifier presented to the central server at connect time.
    pub id: String,

    /// Routing code for callbacks.
    pub code: String,
}

impl SupplierIdentity {
    pub fn new(id: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
        }
    }
}

/// Deployment flavour. Drives the defaults of the mode switches below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Tenancy {
    #[default]
    Single,
    Multi,
}

/// Local API convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocalApiMode {
    /// `POST <base>/process` with a JSON envelope, JSON result back.
    Structured,
    /// `GET <base>/<kode>.<tujuan>.<trxId>`, raw text back.
    LegacyPath,
}

/// Local API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LocalApiConfig {
    /// Base URL of the local software. Empty means the tenancy default.
    pub base_url: String,

    /// Calling convention. `None` means the tenancy default.
    pub mode: Option<LocalApiMode>,
}

/// How the supplier id is presented when connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialPlacement {
    /// Socket.IO CONNECT auth payload.
    Auth,
    /// `supplierId` query parameter on the handshake URL.
    Query,
}

/// Persistent channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Socket.IO namespace.
    pub namespace: String,

    /// Engine.IO handshake path.
    pub path: String,

    /// Fixed delay between reconnection attempts in milliseconds.
    pub reconnect_delay_ms: u64,

    /// Credential placement. `None` means the tenancy default.
    pub credential: Option<CredentialPlacement>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            namespace: "/supplier".to_string(),
            path: "/socket.io/".to_string(),
            reconnect_delay_ms: 3000,
            credential: None,
        }
    }
}

/// Shape of the central server's callback endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallbackRoute {
    /// `POST <server>/api/callback/<code>`
    Path,
    /// `POST <server>/api/supplier-callback?code=<code>`
    Query,
}

/// Callback delivery configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CallbackConfig {
    /// Route shape. `None` means the tenancy default.
    pub route: Option<CallbackRoute>,
}

/// Acknowledgment body returned to legacy senders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AckStyle {
    /// `text/plain` "OK".
    #[default]
    Text,
    /// `{"ok":true}`.
    Json,
}

/// Legacy callback receiver configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Enable the receiver.
    pub enabled: bool,

    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Maximum raw body size captured, in bytes.
    pub max_body_bytes: usize,

    /// Acknowledgment style.
    pub ack: AckStyle,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:8000".to_string(),
            max_body_bytes: 3 * 1024 * 1024,
            ack: AckStyle::Text,
        }
    }
}

/// Timeout configuration for outbound calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Local API call timeout in seconds.
    pub local_api_secs: u64,

    /// Callback delivery timeout in seconds.
    pub callback_secs: u64,

    /// Upper bound on a pending reply in seconds.
    pub reply_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            local_api_secs: 20,
            callback_secs: 15,
            reply_secs: 25,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Prometheus listener address. Metrics are disabled when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_address: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

// Effective settings once tenancy defaults are applied.
impl RelayConfig {
    pub fn local_api_mode(&self) -> LocalApiMode {
        self.local_api.mode.unwrap_or(match self.tenancy {
            Tenancy::Single => LocalApiMode::LegacyPath,
            Tenancy::Multi => LocalApiMode::Structured,
        })
    }

    pub fn local_api_base(&self) -> &str {
        if !self.local_api.base_url.is_empty() {
            return &self.local_api.base_url;
        }
        match self.tenancy {
            Tenancy::Single => "http://127.0.0.1:8001",
            Tenancy::Multi => "http://127.0.0.1:5001",
        }
    }

    pub fn callback_route(&self) -> CallbackRoute {
        self.callback.route.unwrap_or(match self.tenancy {
            Tenancy::Single => CallbackRoute::Path,
            Tenancy::Multi => CallbackRoute::Query,
        })
    }

    pub fn credential_placement(&self) -> CredentialPlacement {
        self.channel.credential.unwrap_or(match self.tenancy {
            Tenancy::Single => CredentialPlacement::Auth,
            Tenancy::Multi => CredentialPlacement::Query,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenancy_defaults() {
        let mut config = RelayConfig::default();
        assert_eq!(config.local_api_mode(), LocalApiMode::LegacyPath);
        assert_eq!(config.callback_route(), CallbackRoute::Path);
        assert_eq!(config.credential_placement(), CredentialPlacement::Auth);
        assert_eq!(config.local_api_base(), "http://127.0.0.1:8001");

        config.tenancy = Tenancy::Multi;
        assert_eq!(config.local_api_mode(), LocalApiMode::Structured);
        assert_eq!(config.callback_route(), CallbackRoute::Query);
        assert_eq!(config.credential_placement(), CredentialPlacement::Query);
        assert_eq!(config.local_api_base(), "http://127.0.0.1:5001");
    }

    #[test]
    fn test_explicit_modes_win() {
        let mut config = RelayConfig::default();
        config.tenancy = Tenancy::Multi;
        config.local_api.mode = Some(LocalApiMode::LegacyPath);
        config.callback.route = Some(CallbackRoute::Path);
        assert_eq!(config.local_api_mode(), LocalApiMode::LegacyPath);
        assert_eq!(config.callback_route(), CallbackRoute::Path);
    }

    #[test]
    fn test_toml_sections() {
        let config: RelayConfig = toml::from_str(
            r#"
            server_url = "http://pusat:3000"

            [[suppliers]]
            id = "cltAAA"
            code = "PC_A"

            [timeouts]
            reply_secs = 40

            [channel]
            reconnect_delay_ms = 500
            "#,
        )
        .unwrap();

        assert_eq!(config.suppliers, vec![SupplierIdentity::new("cltAAA", "PC_A")]);
        assert_eq!(config.timeouts.reply_secs, 40);
        assert_eq!(config.timeouts.local_api_secs, 20);
        assert_eq!(config.channel.reconnect_delay_ms, 500);
        assert_eq!(config.channel.namespace, "/supplier");
    }
}
