//! Legacy path-encoded local API.
//!
//! Old supplier software takes the whole order in the URL path as
//! `<kode>.<tujuan>.<trxId>` and answers with free text. The text is never
//! final, so every answer is relayed as `PROCESS`; the outcome arrives later
//! through the callback receiver.

use std::time::Duration;

use url::Url;

use crate::dispatch::types::{InboundRequest, LocalResult};
use crate::dispatch::{build_client, join_segment, parse_base, DispatchError};

#[derive(Debug, Clone)]
pub struct LegacyPathApi {
    client: reqwest::Client,
    base: Url,
    timeout: Duration,
}

impl LegacyPathApi {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, DispatchError> {
        Ok(Self {
            client: build_client(timeout)?,
            base: parse_base(base)?,
            timeout,
        })
    }

    /// Dotted order path. Missing fields leave their slot empty; an order
    /// with no fields at all renders as `..` and is refused by `url_for`.
    pub fn order_path(request: &InboundRequest) -> String {
        ["kode", "tujuan", "trxId"]
            .iter()
            .map(|key| request.field_text(key).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn url_for(&self, request: &InboundRequest) -> Result<Url, DispatchError> {
        join_segment(&self.base, &Self::order_path(request))
    }

    pub(crate) async fn call(&self, request: &InboundRequest) -> Result<LocalResult, DispatchError> {
        let url = self.url_for(request)?;
        tracing::info!(url = %url, "Calling legacy local API");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| DispatchError::from_reqwest(e, self.timeout))?;

        let text = response
            .text()
            .await
            .map_err(|e| DispatchError::from_reqwest(e, self.timeout))?;

        Ok(LocalResult::process(text))
    }
}
