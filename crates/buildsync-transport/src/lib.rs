//! Retrying JSON-over-HTTP transport shared by buildsync REST clients.
//!
//! Every request completes exactly once with either a decoded value or a
//! `ClientError`; transport failures, non-2xx statuses, and malformed bodies
//! all surface as errors after the retry budget is spent.
//!
//! Requests that create something on the remote (integrations, bots,
//! comments) go through the `*_non_idempotent` helpers, which only retry
//! when the connection could not be established.

mod retry;

use std::time::Duration;

use buildsync_types::ClientError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;

pub use retry::{
    is_retryable_before_send, is_retryable_status, is_retryable_transport_error,
    parse_retry_after, retry_delay, truncate_for_error,
};

const RETRY_ATTEMPT_HEADER: &str = "x-buildsync-retry-attempt";
const ERROR_BODY_MAX_CHARS: usize = 800;

#[derive(Debug, Clone)]
/// Connection settings for one REST endpoint.
pub struct TransportConfig {
    pub api_base: String,
    pub user_agent: String,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
    /// Skips TLS certificate validation; CI servers commonly run self-signed.
    pub accept_invalid_certs: bool,
}

impl TransportConfig {
    pub fn new(api_base: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            user_agent: user_agent.into(),
            request_timeout_ms: 30_000,
            retry_max_attempts: 3,
            retry_base_delay_ms: 500,
            accept_invalid_certs: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Which failures a request may be resent after.
pub enum RetryPolicy {
    /// Retry timeouts, connect failures, 429 and 5xx responses.
    Idempotent,
    /// Retry only failures where the request never reached the server.
    ConnectOnly,
}

#[derive(Debug, Clone)]
pub struct JsonResponse<T> {
    pub value: T,
    pub headers: HeaderMap,
}

#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    api_base: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl HttpTransport {
    pub fn new(
        config: &TransportConfig,
        extra_headers: &[(&'static str, String)],
    ) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|_| ClientError::InvalidRequest("invalid user agent header".into()))?,
        );
        for (name, value) in extra_headers {
            let value = HeaderValue::from_str(value).map_err(|_| {
                ClientError::InvalidRequest(format!("invalid value for header {name}"))
            })?;
            headers.insert(HeaderName::from_static(name), value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            retry_max_attempts: config.retry_max_attempts.max(1),
            retry_base_delay_ms: config.retry_base_delay_ms.max(1),
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    pub async fn request_json<T, F>(
        &self,
        operation: &str,
        request_builder: F,
    ) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        Ok(self
            .request_json_with_headers(operation, request_builder)
            .await?
            .value)
    }

    pub async fn request_json_with_headers<T, F>(
        &self,
        operation: &str,
        request_builder: F,
    ) -> Result<JsonResponse<T>, ClientError>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        self.decode_json(
            operation,
            self.send_with_retry(operation, RetryPolicy::Idempotent, request_builder)
                .await?,
        )
        .await
    }

    /// Like `request_json`, for requests that must not be repeated once the
    /// server may have received them.
    pub async fn request_json_non_idempotent<T, F>(
        &self,
        operation: &str,
        request_builder: F,
    ) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = self
            .send_with_retry(operation, RetryPolicy::ConnectOnly, request_builder)
            .await?;
        Ok(self.decode_json(operation, response).await?.value)
    }

    async fn decode_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        response: reqwest::Response,
    ) -> Result<JsonResponse<T>, ClientError> {
        let headers = response.headers().clone();
        let bytes = response.bytes().await?;
        let value = serde_json::from_slice::<T>(&bytes).map_err(|error| {
            ClientError::InvalidResponse(format!("failed to decode {operation}: {error}"))
        })?;
        Ok(JsonResponse { value, headers })
    }

    /// Sends a request whose response body is ignored.
    pub async fn request_empty<F>(
        &self,
        operation: &str,
        request_builder: F,
    ) -> Result<(), ClientError>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        self.send_with_retry(operation, RetryPolicy::Idempotent, request_builder)
            .await?;
        Ok(())
    }

    pub async fn request_empty_non_idempotent<F>(
        &self,
        operation: &str,
        request_builder: F,
    ) -> Result<(), ClientError>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        self.send_with_retry(operation, RetryPolicy::ConnectOnly, request_builder)
            .await?;
        Ok(())
    }

    async fn send_with_retry<F>(
        &self,
        operation: &str,
        policy: RetryPolicy,
        mut request_builder: F,
    ) -> Result<reqwest::Response, ClientError>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = request_builder()
                .header(RETRY_ATTEMPT_HEADER, attempt.saturating_sub(1).to_string())
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if policy == RetryPolicy::Idempotent
                        && attempt < self.retry_max_attempts
                        && is_retryable_status(status.as_u16())
                    {
                        tracing::debug!(
                            operation,
                            status = status.as_u16(),
                            attempt,
                            "retrying request after retryable status"
                        );
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }

                    return Err(ClientError::HttpStatus {
                        status: status.as_u16(),
                        body: truncate_for_error(&body, ERROR_BODY_MAX_CHARS),
                    });
                }
                Err(error) => {
                    let retryable = match policy {
                        RetryPolicy::Idempotent => is_retryable_transport_error(&error),
                        RetryPolicy::ConnectOnly => is_retryable_before_send(&error),
                    };
                    if attempt < self.retry_max_attempts && retryable {
                        tracing::debug!(
                            operation,
                            attempt,
                            error = %error,
                            "retrying request after transport error"
                        );
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(ClientError::Http(error));
                }
            }
        }
    }
}
