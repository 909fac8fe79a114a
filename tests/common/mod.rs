#![allow(dead_code)]

use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use webposto_mcp::mcp::adapter::ProtocolAdapter;
use webposto_mcp::registry::EndpointRegistry;
use webposto_mcp::services::credentials::{Credential, CredentialHolder, StaticSecretProvider};
use webposto_mcp::services::dispatcher::ToolDispatcher;
use webposto_mcp::services::erp_client::{
    ErpClient, ErpRequest, HttpBackend, RawResponse, RetryPolicy, TransportError,
};
use webposto_mcp::services::logger::{LogLevel, Logger};

pub static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub const API_KEY: &str = "test-api-key";

/// Replays canned ERP answers in order and records every request.
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    pub requests: Mutex<Vec<ErpRequest>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Result<RawResponse, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    pub async fn last_url(&self) -> String {
        self.requests
            .lock()
            .await
            .last()
            .map(|r| r.url.to_string())
            .unwrap_or_default()
    }
}

#[async_trait]
impl HttpBackend for ScriptedBackend {
    async fn send(&self, request: &ErpRequest) -> Result<RawResponse, TransportError> {
        self.requests.lock().await.push(request.clone());
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connect("no scripted reply".to_string())))
    }
}

pub fn ok(body: serde_json::Value) -> Result<RawResponse, TransportError> {
    Ok(RawResponse {
        status: 200,
        body: body.to_string(),
    })
}

pub fn status(code: u16, body: &str) -> Result<RawResponse, TransportError> {
    Ok(RawResponse {
        status: code,
        body: body.to_string(),
    })
}

pub struct Harness {
    pub backend: Arc<ScriptedBackend>,
    pub credentials: Arc<CredentialHolder>,
    pub dispatcher: Arc<ToolDispatcher>,
    pub adapter: Arc<ProtocolAdapter>,
}

pub fn quiet_logger() -> Logger {
    Logger::with_level("test", LogLevel::Error)
}

pub fn harness(replies: Vec<Result<RawResponse, TransportError>>) -> Harness {
    harness_with_company(replies, None)
}

pub fn harness_with_company(
    replies: Vec<Result<RawResponse, TransportError>>,
    default_company: Option<&str>,
) -> Harness {
    let logger = quiet_logger();
    let backend = ScriptedBackend::new(replies);
    let registry = Arc::new(EndpointRegistry::builtin().expect("builtin registry"));
    let credential = Credential::new(API_KEY).expect("credential");
    let credentials = Arc::new(CredentialHolder::new(
        logger.clone(),
        Arc::new(StaticSecretProvider::new(credential)),
        "WEBPOSTO_API_KEY",
    ));
    let client = Arc::new(ErpClient::new(
        logger.clone(),
        backend.clone(),
        url::Url::parse("http://erp.test").expect("url"),
        Duration::from_millis(100),
        RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
            jitter: 0.0,
        },
    ));
    let dispatcher = Arc::new(ToolDispatcher::new(
        logger.clone(),
        registry,
        client,
        credentials.clone(),
        default_company.map(str::to_string),
    ));
    let adapter = Arc::new(ProtocolAdapter::new(logger, dispatcher.clone()));
    Harness {
        backend,
        credentials,
        dispatcher,
        adapter,
    }
}

pub fn args(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    value.as_object().cloned().expect("object arguments")
}
