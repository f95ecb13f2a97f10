//! Pooled HTTP client for the chat-completions endpoint.
//!
//! One [`ApiClient`] is created per pipeline run and dropped with it. The
//! underlying `reqwest::Client` keeps at most `max_idle_connections` idle
//! keep-alive sockets; a semaphore caps simultaneously open requests at
//! `max_connections` so socket count stays bounded however many calls are
//! issued at once.
//!
//! Every failure is mapped to a typed [`ApiError`]: timeout, non-2xx status
//! (with its code), malformed JSON, or a generic transport fault.
//! [`ApiClient::post_batch`] never aggregates failures; it returns one
//! `Result` per payload, in payload order.

use crate::config::EndpointConfig;
use crate::error::{ApiError, TranslateError};
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error};

/// Path of the chat-completions route, appended to the base URL.
pub const CHAT_COMPLETIONS: &str = "/v1/chat/completions";

/// Async JSON client bound to one endpoint.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
    permits: Arc<Semaphore>,
}

impl ApiClient {
    /// Build a client for `config`.
    ///
    /// Fails with [`TranslateError::Configuration`] when the URL or the
    /// credential is missing, before any socket is opened.
    pub fn new(config: &EndpointConfig) -> Result<Self, TranslateError> {
        config.validate()?;

        let mut headers = reqwest::header::HeaderMap::new();
        let bearer = format!("Bearer {}", config.api_key);
        let mut auth = reqwest::header::HeaderValue::from_str(&bearer).map_err(|_| {
            TranslateError::Configuration("API token contains invalid header characters".into())
        })?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .pool_max_idle_per_host(config.max_idle_connections)
            .default_headers(headers)
            .build()
            .map_err(|e| TranslateError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_secs,
            permits: Arc::new(Semaphore::new(config.max_connections.max(1))),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `payload` as JSON to `{base_url}{endpoint}` and parse the JSON reply.
    pub async fn post(&self, endpoint: &str, payload: &Value) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ApiError::Transport {
                url: url.clone(),
                detail: e.to_string(),
            })?;

        debug!("POST {}", url);
        let response = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.map_reqwest(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Request to {} failed with status code {}", url, status.as_u16());
            return Err(ApiError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_reqwest(&url, e))?;

        serde_json::from_slice(&bytes).map_err(|e| {
            error!("Malformed JSON from {}: {}", url, e);
            ApiError::MalformedJson {
                url,
                detail: e.to_string(),
            }
        })
    }

    /// Issue every payload concurrently; result `i` belongs to payload `i`.
    pub async fn post_batch(
        &self,
        endpoint: &str,
        payloads: &[Value],
    ) -> Vec<Result<Value, ApiError>> {
        join_all(payloads.iter().map(|p| self.post(endpoint, p))).await
    }

    fn map_reqwest(&self, url: &str, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            error!("Request to {} timed out", url);
            ApiError::Timeout {
                url: url.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            error!("Network error for {}: {}", url, e);
            ApiError::Transport {
                url: url.to_string(),
                detail: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_credential_before_network() {
        let cfg = EndpointConfig::new("http://127.0.0.1:9", "", "m");
        assert!(matches!(
            ApiClient::new(&cfg),
            Err(TranslateError::Configuration(_))
        ));
    }

    #[test]
    fn strips_trailing_slash() {
        let cfg = EndpointConfig::new("http://localhost:8000/", "k", "m");
        let client = ApiClient::new(&cfg).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        // Port 9 (discard) is closed on test hosts.
        let cfg = EndpointConfig::new("http://127.0.0.1:9", "k", "m").with_timeout_secs(5);
        let client = ApiClient::new(&cfg).unwrap();
        let err = client
            .post(CHAT_COMPLETIONS, &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(
            matches!(err, ApiError::Transport { .. } | ApiError::Timeout { .. }),
            "got: {err:?}"
        );
    }

    #[tokio::test]
    async fn empty_batch_returns_empty() {
        let cfg = EndpointConfig::new("http://127.0.0.1:9", "k", "m");
        let client = ApiClient::new(&cfg).unwrap();
        assert!(client.post_batch(CHAT_COMPLETIONS, &[]).await.is_empty());
    }
}
