//! Best-effort callback delivery.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::config::CallbackRoute;
use crate::observability::metrics;

/// Why a single delivery attempt failed. Only ever logged.
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("callback request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("central server answered {0}")]
    Status(StatusCode),
}

/// Posts notifications to the central server.
///
/// Not tied to any connection: the route is resolved from the supplier
/// code on every call.
#[derive(Debug, Clone)]
pub struct CallbackEmitter {
    client: reqwest::Client,
    server_url: Url,
    route: CallbackRoute,
}

impl CallbackEmitter {
    pub fn new(server_url: &str, route: CallbackRoute, timeout: Duration) -> Result<Self, CallbackError> {
        let mut url = Url::parse(server_url).map_err(|e| CallbackError::InvalidUrl(format!("{}: {}", server_url, e)))?;
        let http_scheme = match url.scheme() {
            "ws" => Some("http"),
            "wss" => Some("https"),
            _ => None,
        };
        if let Some(scheme) = http_scheme {
            url.set_scheme(scheme)
                .map_err(|_| CallbackError::InvalidUrl(server_url.to_string()))?;
        }
        if url.cannot_be_a_base() {
            return Err(CallbackError::InvalidUrl(server_url.to_string()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            server_url: url,
            route,
        })
    }

    /// Callback endpoint for `supplier_code`.
    pub fn endpoint(&self, supplier_code: &str) -> Result<Url, CallbackError> {
        let mut url = self.server_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| CallbackError::InvalidUrl(self.server_url.to_string()))?;
            segments.pop_if_empty();
            match self.route {
                CallbackRoute::Path => {
                    segments.extend(["api", "callback", supplier_code]);
                }
                CallbackRoute::Query => {
                    segments.extend(["api", "supplier-callback"]);
                }
            }
        }
        if self.route == CallbackRoute::Query {
            url.query_pairs_mut().append_pair("code", supplier_code);
        }
        Ok(url)
    }

    /// Deliver one notification, once.
    ///
    /// Resolves whatever happens: failures are logged and dropped, never
    /// retried and never reported to the caller.
    pub async fn send<T>(&self, supplier_code: &str, payload: &T)
    where
        T: Serialize + ?Sized,
    {
        match self.try_send(supplier_code, payload).await {
            Ok(status) => {
                tracing::debug!(supplier = %supplier_code, status = %status, "Callback delivered");
                metrics::record_callback(supplier_code, "delivered");
            }
            Err(e) => {
                tracing::warn!(supplier = %supplier_code, error = %e, "Callback failed");
                metrics::record_callback(supplier_code, "failed");
            }
        }
    }

    async fn try_send<T>(&self, supplier_code: &str, payload: &T) -> Result<StatusCode, CallbackError>
    where
        T: Serialize + ?Sized,
    {
        let url = self.endpoint(supplier_code)?;
        tracing::info!(supplier = %supplier_code, url = %url, "Sending callback");

        let response = self.client.post(url).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CallbackError::Status(status));
        }
        Ok(status)
    }
}
