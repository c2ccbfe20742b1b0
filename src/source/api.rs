use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use super::retry::{is_retryable_http_error, is_retryable_network_error, retry_async, Permanent, RetryConfig};
use super::{fingerprint, OrderSource, SourceOutput};
use crate::config::Config;
use crate::logging::{debug, log_fetch, obj, v_str, Domain};
use crate::order::ApiOrder;

/// Lists public open sell orders from the marketplace HTTP API.
pub struct ApiSource {
    client: Client,
    base: String,
    token: Option<String>,
    retry: RetryConfig,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OrdersResponse {
    Wrapped { data: Vec<ApiOrder> },
    List(Vec<ApiOrder>),
}

impl OrdersResponse {
    fn into_orders(self) -> Vec<ApiOrder> {
        match self {
            OrdersResponse::Wrapped { data } => data,
            OrdersResponse::List(orders) => orders,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
struct ApiError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ApiSource {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.api_timeout_secs))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            base: cfg.api_base.trim_end_matches('/').to_string(),
            token: cfg.api_token.clone(),
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_once(&self) -> Result<Vec<u8>> {
        let url = format!("{}/v0/orders", self.base);
        let mut req = self.client.get(&url).query(&[
            ("side", "sell"),
            ("only_open", "true"),
            ("include_public", "true"),
        ]);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) if is_retryable_network_error(&e) => return Err(e.into()),
            Err(e) => return Err(Permanent(format!("request to {} failed: {}", url, e)).into()),
        };

        let status = resp.status();
        let body = resp.bytes().await?;
        if status.is_success() {
            return Ok(body.to_vec());
        }

        let err: ApiError = serde_json::from_slice(&body).unwrap_or_default();
        let detail = err
            .message
            .or(err.code)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
        match status {
            StatusCode::BAD_REQUEST => Err(Permanent(format!("bad request: {}", detail)).into()),
            StatusCode::UNAUTHORIZED => {
                Err(Permanent("session token expired; log in again or set SF_TOKEN".to_string()).into())
            }
            s if is_retryable_http_error(s.as_u16()) => Err(anyhow!("failed to list orders: {} {}", s.as_u16(), detail)),
            s => Err(Permanent(format!("failed to list orders: {} {}", s.as_u16(), detail)).into()),
        }
    }
}

#[async_trait]
impl OrderSource for ApiSource {
    fn name(&self) -> &'static str {
        "api"
    }

    async fn fetch(&self) -> Result<SourceOutput> {
        debug(Domain::Source, "request", obj(&[("base", v_str(&self.base))]));
        let body = retry_async(&self.retry, "list_orders", || self.fetch_once()).await?;
        log_fetch(self.name(), body.len(), &fingerprint(&body));
        let orders: OrdersResponse =
            serde_json::from_slice(&body).context("unexpected response from orders endpoint")?;
        Ok(SourceOutput::Orders(orders.into_orders()))
    }
}
