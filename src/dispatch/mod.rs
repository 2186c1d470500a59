//! Local API dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! InboundRequest (method, payload)
//!     → LocalDispatcher (variant picked by config, never auto-detected)
//!         ├─ structured.rs: POST <base>/process, JSON result
//!         └─ legacy.rs:     GET  <base>/<kode>.<tujuan>.<trxId>, raw text
//!     → types.rs normalization
//!     → LocalResult (always; errors become FAILED)
//! ```
//!
//! # Design Decisions
//! - One entry point for both conventions; callers never branch on mode
//! - Every call carries a deadline; a timeout is just another FAILED result
//! - Calls share only the pooled `reqwest::Client`, no mutable state

pub mod legacy;
pub mod structured;
pub mod types;

use std::time::{Duration, Instant};

use thiserror::Error;
use url::Url;

use crate::config::{LocalApiMode, RelayConfig, SupplierIdentity};
use crate::observability::metrics;

pub use legacy::LegacyPathApi;
pub use structured::StructuredApi;
pub use types::{InboundRequest, LocalResult, ResultStatus};

/// Errors from a single local API call. Never escape [`LocalDispatcher::dispatch`].
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("local API timed out after {0}s")]
    Timeout(u64),

    #[error("local API unreachable: {0}")]
    Unreachable(String),

    #[error("local API returned status {0}")]
    Status(u16),

    #[error("invalid local API URL: {0}")]
    InvalidUrl(String),

    #[error("local API request failed: {0}")]
    Request(String),
}

impl DispatchError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            DispatchError::Timeout(timeout.as_secs())
        } else if err.is_connect() {
            DispatchError::Unreachable(err.to_string())
        } else if let Some(status) = err.status() {
            DispatchError::Status(status.as_u16())
        } else {
            DispatchError::Request(err.to_string())
        }
    }
}

/// The local API, in whichever convention the deployment uses.
#[derive(Debug, Clone)]
pub enum LocalDispatcher {
    Structured(StructuredApi),
    LegacyPath(LegacyPathApi),
}

impl LocalDispatcher {
    /// Build the dispatcher selected by configuration.
    pub fn from_config(config: &RelayConfig) -> Result<Self, DispatchError> {
        let timeout = Duration::from_secs(config.timeouts.local_api_secs);
        let base = config.local_api_base();
        Ok(match config.local_api_mode() {
            LocalApiMode::Structured => Self::Structured(StructuredApi::new(base, timeout)?),
            LocalApiMode::LegacyPath => Self::LegacyPath(LegacyPathApi::new(base, timeout)?),
        })
    }

    pub fn mode(&self) -> LocalApiMode {
        match self {
            Self::Structured(_) => LocalApiMode::Structured,
            Self::LegacyPath(_) => LocalApiMode::LegacyPath,
        }
    }

    /// Run one request against the local API.
    ///
    /// Always yields a result: transport errors, non-2xx answers and
    /// timeouts come back as `FAILED`.
    pub async fn dispatch(&self, supplier: &SupplierIdentity, request: &InboundRequest) -> LocalResult {
        let start = Instant::now();
        let outcome = match self {
            Self::Structured(api) => api.call(supplier, request).await,
            Self::LegacyPath(api) => api.call(request).await,
        };
        metrics::record_local_call(&supplier.code, outcome.is_ok(), start);

        match outcome {
            Ok(result) => {
                tracing::debug!(
                    supplier = %supplier.code,
                    reference = %request.reference,
                    status = %result.status,
                    "Local API answered"
                );
                result
            }
            Err(e) => {
                tracing::warn!(
                    supplier = %supplier.code,
                    reference = %request.reference,
                    error = %e,
                    "Local API call failed"
                );
                LocalResult::failed(e.to_string())
            }
        }
    }
}

/// Shared HTTP client for local calls.
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, DispatchError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| DispatchError::Request(e.to_string()))
}

pub(crate) fn parse_base(base: &str) -> Result<Url, DispatchError> {
    let url = Url::parse(base).map_err(|e| DispatchError::InvalidUrl(format!("{}: {}", base, e)))?;
    if url.cannot_be_a_base() {
        return Err(DispatchError::InvalidUrl(base.to_string()));
    }
    Ok(url)
}

/// Append one path segment to `base`, percent-encoding as needed.
///
/// `.` and `..` are dot segments in every spelling, percent-encoded or not,
/// and cannot be sent as-is; they are refused.
pub(crate) fn join_segment(base: &Url, segment: &str) -> Result<Url, DispatchError> {
    if matches!(segment, "." | "..") {
        return Err(DispatchError::InvalidUrl(format!(
            "{:?} cannot be sent as a path segment",
            segment
        )));
    }
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| DispatchError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .push(segment);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_segment_keeps_base_path() {
        let base = parse_base("http://127.0.0.1:8001/spl/").unwrap();
        let url = join_segment(&base, "S5.0812.R*1").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8001/spl/S5.0812.R*1");

        let root = parse_base("http://127.0.0.1:8001").unwrap();
        assert_eq!(join_segment(&root, "process").unwrap().as_str(), "http://127.0.0.1:8001/process");
    }

    #[test]
    fn test_dot_segments_are_refused() {
        let base = parse_base("http://127.0.0.1:8001/spl").unwrap();
        assert!(matches!(join_segment(&base, ".."), Err(DispatchError::InvalidUrl(_))));
        assert!(matches!(join_segment(&base, "."), Err(DispatchError::InvalidUrl(_))));
        assert_eq!(join_segment(&base, "...").unwrap().path(), "/spl/...");
    }

    #[tokio::test]
    async fn test_order_without_fields_fails_without_calling_base() {
        let dispatcher = LocalDispatcher::LegacyPath(
            LegacyPathApi::new("http://127.0.0.1:9/spl", Duration::from_secs(1)).unwrap(),
        );
        let supplier = SupplierIdentity::new("cltAAA", "PC_A");
        let request = InboundRequest::new("topup", "r1", Default::default());

        let result = dispatcher.dispatch(&supplier, &request).await;
        assert_eq!(result.status, ResultStatus::Failed);
        assert!(!result.ok);
        assert!(result.message.contains("\"..\""), "{}", result.message);
        assert!(result.raw.is_none());
    }

    #[test]
    fn test_rejects_non_base_url() {
        assert!(matches!(parse_base("mailto:ops@example.com"), Err(DispatchError::InvalidUrl(_))));
        assert!(matches!(parse_base("not a url"), Err(DispatchError::InvalidUrl(_))));
    }

    #[test]
    fn test_mode_follows_config() {
        let mut config = RelayConfig::default();
        let dispatcher = LocalDispatcher::from_config(&config).unwrap();
        assert_eq!(dispatcher.mode(), LocalApiMode::LegacyPath);

        config.local_api.mode = Some(LocalApiMode::Structured);
        let dispatcher = LocalDispatcher::from_config(&config).unwrap();
        assert_eq!(dispatcher.mode(), LocalApiMode::Structured);
    }

    #[test]
    fn test_error_messages_are_not_empty() {
        assert_eq!(DispatchError::Timeout(20).to_string(), "local API timed out after 20s");
        assert!(!DispatchError::Status(500).to_string().is_empty());
    }
}
