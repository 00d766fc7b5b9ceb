use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use crate::config::Config;

const API_KEY_HEADER: &str = "x-apisports-key";
const MAX_ERROR_BODY: usize = 300;

#[derive(Debug, Clone, Error)]
pub enum UpstreamFailure {
    /// Network error, timeout, non-2xx status or undecodable body.
    #[error("upstream unavailable: {detail}")]
    Unavailable { status: Option<u16>, detail: String },
    /// 2xx response whose `errors` field is non-empty.
    #[error("upstream returned errors: {0}")]
    Rejected(Value),
}

pub type FetchResult = Result<Value, UpstreamFailure>;

/// HTTP GET returning parsed JSON. No retries.
pub trait Upstream: Send + Sync + 'static {
    fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> impl Future<Output = FetchResult> + Send;
}

pub struct UpstreamClient {
    client: Client,
    api_key: Option<String>,
}

impl UpstreamClient {
    pub fn new(api_key: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, api_key })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(config.api_key.clone(), config.upstream_timeout)
    }
}

impl Upstream for UpstreamClient {
    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> FetchResult {
        let mut request = self.client.get(url).query(query);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!("GET {} failed: {}", url, e);
            UpstreamFailure::Unavailable {
                status: None,
                detail: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(floor_char_boundary(&body, MAX_ERROR_BODY));
            tracing::warn!("GET {} returned {}: {}", url, status, body);
            return Err(UpstreamFailure::Unavailable {
                status: Some(status.as_u16()),
                detail: format!("HTTP {}: {}", status, body),
            });
        }

        let body: Value = response.json().await.map_err(|e| {
            tracing::warn!("GET {} returned malformed JSON: {}", url, e);
            UpstreamFailure::Unavailable {
                status: Some(status.as_u16()),
                detail: format!("malformed body: {}", e),
            }
        })?;

        check_errors(body)
    }
}

/// API-Football reports problems in an `errors` array or object on a 200.
pub fn check_errors(body: Value) -> FetchResult {
    let has_errors = match body.get("errors") {
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        _ => false,
    };
    if has_errors {
        return Err(UpstreamFailure::Rejected(body["errors"].clone()));
    }
    Ok(body)
}

/// The `response` array of an API-Football envelope; empty when absent.
pub fn response_list(body: Value) -> Vec<Value> {
    match body {
        Value::Object(mut map) => match map.remove("response") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}
