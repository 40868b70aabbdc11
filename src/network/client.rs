//! HTTP client wrapper - forwards materialized requests through the backend proxy

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Config;
use crate::constants::PROXY_PATH;
use crate::error::{Error, Result};
use crate::models::Response;
use crate::request::MaterializedRequest;

/// Body of a proxy call
#[derive(Debug, Serialize)]
struct ProxyPayload<'a> {
    url: &'a str,
    method: &'a str,
    headers: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ProxyReply {
    #[serde(default)]
    success: bool,
    data: Option<Response>,
    message: Option<String>,
}

/// Executes HTTP requests by way of the backend proxy endpoint
#[derive(Clone, Debug)]
pub struct ProxyClient {
    client: reqwest::Client,
    proxy_url: String,
    token: String,
    timeout: Duration,
}

impl ProxyClient {
    pub fn new(api_url: &str, token: impl Into<String>, timeout: Duration) -> Self {
        ProxyClient {
            client: create_client(timeout),
            proxy_url: format!("{}/{}", api_url.trim_end_matches('/'), PROXY_PATH),
            token: token.into(),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        ProxyClient::new(
            &config.api_url,
            config.token.clone().unwrap_or_default(),
            config.request_timeout(),
        )
    }

    pub fn proxy_url(&self) -> &str {
        &self.proxy_url
    }

    /// Execute a request; failures come back as a response with `error` set
    pub async fn execute(&self, request: &MaterializedRequest) -> Response {
        let start = Instant::now();
        let result = self.forward(request).await;
        let elapsed = start.elapsed().as_millis() as u64;

        match result {
            Ok(mut response) => {
                response.time = elapsed;
                if response.size == 0 {
                    response.size = serde_json::to_vec(&response.data)
                        .map(|bytes| bytes.len() as u64)
                        .unwrap_or(0);
                }
                response
            }
            Err(e) => {
                tracing::warn!(request_id = %request.request_id, error = %e, "Proxy call failed");
                Response::failed(e.to_string(), elapsed)
            }
        }
    }

    async fn forward(&self, request: &MaterializedRequest) -> Result<Response> {
        let resp = self
            .client
            .post(&self.proxy_url)
            .bearer_auth(&self.token)
            .json(&build_payload(request))
            .send()
            .await
            .map_err(|e| self.describe(e))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::proxy(format!("Error reading body: {}", e)))?;

        let reply: ProxyReply = serde_json::from_str(&body).map_err(|e| {
            if status.is_success() {
                Error::proxy(format!("Invalid proxy reply: {}", e))
            } else {
                Error::proxy(format!("Proxy returned {}", status))
            }
        })?;

        match reply {
            ProxyReply {
                success: true,
                data: Some(response),
                ..
            } => Ok(response),
            ProxyReply { message, .. } => Err(Error::proxy(
                message.unwrap_or_else(|| "Request failed".to_string()),
            )),
        }
    }

    fn describe(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::proxy(format!("Request timed out ({}s)", self.timeout.as_secs()))
        } else if e.is_connect() {
            Error::proxy(format!("Connection failed: {}", e))
        } else {
            Error::Http(e)
        }
    }
}

/// Headers collapse into an object; for repeated keys the last value wins.
/// The body is only forwarded for methods that carry one.
fn build_payload(request: &MaterializedRequest) -> ProxyPayload<'_> {
    let mut headers = Map::new();
    for (key, value) in &request.headers {
        headers.insert(key.clone(), Value::String(value.clone()));
    }

    let body = if request.method.has_body() {
        request.body.as_deref()
    } else {
        None
    };

    ProxyPayload {
        url: &request.url,
        method: request.method.as_str(),
        headers,
        body,
    }
}

/// Create an HTTP client with the given request timeout
pub fn create_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
