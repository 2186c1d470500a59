//! Structured local API: one JSON endpoint, JSON results.

use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

use crate::config::SupplierIdentity;
use crate::dispatch::types::{InboundRequest, LocalResult};
use crate::dispatch::{build_client, join_segment, parse_base, DispatchError};

/// Body posted to `<base>/process`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessEnvelope<'a> {
    method: &'a str,
    payload: &'a Map<String, Value>,
    supplier_id: &'a str,
    supplier_code: &'a str,
}

#[derive(Debug, Clone)]
pub struct StructuredApi {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl StructuredApi {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, DispatchError> {
        let endpoint = join_segment(&parse_base(base)?, "process")?;
        Ok(Self {
            client: build_client(timeout)?,
            endpoint,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub(crate) async fn call(
        &self,
        supplier: &SupplierIdentity,
        request: &InboundRequest,
    ) -> Result<LocalResult, DispatchError> {
        tracing::info!(
            supplier = %supplier.code,
            method = %request.method,
            url = %self.endpoint,
            "Calling local API"
        );

        let envelope = ProcessEnvelope {
            method: &request.method,
            payload: &request.payload,
            supplier_id: &supplier.id,
            supplier_code: &supplier.code,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&envelope)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| DispatchError::from_reqwest(e, self.timeout))?;

        let body = response
            .text()
            .await
            .map_err(|e| DispatchError::from_reqwest(e, self.timeout))?;

        Ok(LocalResult::normalize(&body))
    }
}
