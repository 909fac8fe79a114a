use crate::constants::limits::LOG_BODY_BYTES;
use crate::constants::network::AUTH_QUERY_PARAM;
use crate::constants::retry;
use crate::errors::ToolError;
use crate::registry::{ArrayStyle, EndpointDefinition, HttpMethod};
use crate::services::credentials::Credential;
use crate::services::logger::Logger;
use crate::services::validation::{NormalizedQuery, WireValue};
use crate::utils::redact::redact_query_param;
use crate::utils::text::preview;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct ErpRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub body: Option<Value>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The request never reached the ERP.
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out after {0} ms")]
    Timeout(u64),
    #[error("transport error: {0}")]
    Other(String),
}

#[async_trait]
pub trait HttpBackend: Send + Sync {
    async fn send(&self, request: &ErpRequest) -> Result<RawResponse, TransportError>;
}

pub struct ReqwestBackend {
    client: reqwest::Client,
}

impl ReqwestBackend {
    pub fn new() -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("webposto-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| ToolError::internal(format!("Failed to build HTTP client: {}", err)))?;
        Ok(Self { client })
    }
}

// reqwest renders the request URL, and with it `chave`, unless it is stripped first.
fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> TransportError {
    let err = err.without_url();
    if err.is_timeout() {
        return TransportError::Timeout(timeout.as_millis() as u64);
    }
    if err.is_connect() {
        return TransportError::Connect(err.to_string());
    }
    TransportError::Other(err.to_string())
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn send(&self, request: &ErpRequest) -> Result<RawResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };
        let mut req = self
            .client
            .request(method, request.url.clone())
            .timeout(request.timeout)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = &request.body {
            req = req.json(body);
        }
        let response = req
            .send()
            .await
            .map_err(|err| map_reqwest_error(err, request.timeout))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| map_reqwest_error(err, request.timeout))?;
        Ok(RawResponse { status, body })
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: retry::MAX_ATTEMPTS,
            base_delay_ms: retry::BASE_DELAY_MS,
            max_delay_ms: retry::MAX_DELAY_MS,
            jitter: retry::JITTER,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn compute_delay(&self, attempt: usize) -> Duration {
        let factor: f64 = 2.0;
        let mut delay = (self.base_delay_ms as f64) * factor.powi(attempt.saturating_sub(1) as i32);
        if delay > self.max_delay_ms as f64 {
            delay = self.max_delay_ms as f64;
        }
        if self.jitter > 0.0 {
            let delta = delay * self.jitter;
            delay = delay - delta + rand::random::<f64>() * delta * 2.0;
        }
        Duration::from_millis(delay.max(0.0) as u64)
    }
}

#[derive(Debug, Clone)]
pub struct ErpResponse {
    pub status: u16,
    pub payload: Value,
    pub attempts: usize,
}

/// Parses an ERP body as JSON, falling back to the raw text.
pub fn parse_body(body: &str) -> Value {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(body.to_string()))
}

enum Attempt {
    Done(Result<ErpResponse, ToolError>),
    Retry(ToolError),
}

pub struct ErpClient {
    logger: Logger,
    backend: Arc<dyn HttpBackend>,
    base_url: Url,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ErpClient {
    pub fn new(
        logger: Logger,
        backend: Arc<dyn HttpBackend>,
        base_url: Url,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            logger: logger.child("erp"),
            backend,
            base_url,
            timeout,
            retry,
        }
    }

    pub fn build_url(
        &self,
        endpoint: &EndpointDefinition,
        query: &NormalizedQuery,
        credential: &Credential,
    ) -> Result<Url, ToolError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ToolError::internal(format!("Base URL {} cannot carry a path", self.base_url))
            })?;
            segments.pop_if_empty();
            for segment in endpoint.path.split('/').filter(|s| !s.is_empty()) {
                let resolved = match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                    Some(placeholder) => query.path.get(placeholder).map(String::as_str).ok_or_else(|| {
                        ToolError::internal(format!(
                            "{}: no value for path placeholder {}",
                            endpoint.name, placeholder
                        ))
                    })?,
                    None => segment,
                };
                segments.push(resolved);
            }
        }
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &query.query {
                match value {
                    WireValue::Scalar(text) => {
                        pairs.append_pair(key, text);
                    }
                    WireValue::List(items) => match endpoint.array_style {
                        ArrayStyle::Repeat => {
                            for item in items {
                                pairs.append_pair(key, item);
                            }
                        }
                        ArrayStyle::Comma => {
                            pairs.append_pair(key, &items.join(","));
                        }
                    },
                }
            }
            pairs.append_pair(AUTH_QUERY_PARAM, credential.expose());
        }
        Ok(url)
    }

    /// Sends one call, retrying within the policy.
    ///
    /// Reads retry connection failures, timeouts and 5xx answers. Writes only
    /// retry when the request provably never left, so a 5xx or a timeout on a
    /// write is final. Any 4xx is returned at once.
    pub async fn execute(
        &self,
        endpoint: &EndpointDefinition,
        query: &NormalizedQuery,
        credential: &Credential,
    ) -> Result<ErpResponse, ToolError> {
        let request = ErpRequest {
            method: endpoint.method,
            url: self.build_url(endpoint, query, credential)?,
            body: query.body.clone(),
            timeout: self.timeout,
        };
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.logger.debug(
                "ERP request",
                Some(&serde_json::json!({
                    "method": request.method.as_str(),
                    "url": redact_query_param(request.url.as_str()),
                    "attempt": attempt,
                })),
            );
            let outcome = self.backend.send(&request).await;
            let last_error = match self.classify(endpoint, outcome, attempt) {
                Attempt::Done(result) => return result,
                Attempt::Retry(err) => err,
            };
            if attempt >= max_attempts {
                self.logger.error(
                    "ERP call gave up",
                    Some(&serde_json::json!({
                        "tool": endpoint.name,
                        "attempts": attempt,
                        "error": last_error.message,
                    })),
                );
                return Err(last_error
                    .with_hint(format!("Gave up after {} attempts; try again later.", attempt)));
            }
            let delay = self.retry.compute_delay(attempt);
            self.logger.warn(
                "ERP retry",
                Some(&serde_json::json!({
                    "tool": endpoint.name,
                    "attempt": attempt,
                    "delay_ms": delay.as_millis() as u64,
                    "error": last_error.message,
                })),
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn classify(
        &self,
        endpoint: &EndpointDefinition,
        outcome: Result<RawResponse, TransportError>,
        attempt: usize,
    ) -> Attempt {
        let read = endpoint.method.is_read();
        match outcome {
            Ok(response) if (200..300).contains(&response.status) => {
                let payload = if response.status == 204 {
                    Value::Null
                } else {
                    parse_body(&response.body)
                };
                Attempt::Done(Ok(ErpResponse {
                    status: response.status,
                    payload,
                    attempts: attempt,
                }))
            }
            Ok(response) if response.status >= 500 && read => Attempt::Retry(
                ToolError::transport(format!("ERP answered HTTP {}", response.status))
                    .with_status(response.status)
                    .with_details(serde_json::json!({
                        "upstream_body": parse_body(&response.body),
                        "attempts": attempt,
                    })),
            ),
            Ok(response) => {
                self.logger.warn(
                    "ERP rejected request",
                    Some(&serde_json::json!({
                        "tool": endpoint.name,
                        "status": response.status,
                        "body": preview(&response.body, LOG_BODY_BYTES),
                    })),
                );
                Attempt::Done(Err(ToolError::upstream_rejected(
                    response.status,
                    parse_body(&response.body),
                )))
            }
            Err(err @ TransportError::Connect(_)) => {
                Attempt::Retry(ToolError::transport(redact_query_param(&err.to_string())))
            }
            Err(err) if read => {
                Attempt::Retry(ToolError::transport(redact_query_param(&err.to_string())))
            }
            Err(err) => {
                let mut failure = ToolError::transport(redact_query_param(&err.to_string()))
                    .with_hint("The write may have reached the ERP; check before repeating it.");
                failure.retryable = false;
                Attempt::Done(Err(failure))
            }
        }
    }
}
