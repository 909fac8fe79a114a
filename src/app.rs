use crate::config::Settings;
use crate::errors::ToolError;
use crate::mcp::adapter::ProtocolAdapter;
use crate::registry::EndpointRegistry;
use crate::services::credentials::{
    CredentialHolder, EnvSecretProvider, FileSecretProvider, SecretProvider,
};
use crate::services::dispatcher::ToolDispatcher;
use crate::services::erp_client::{ErpClient, HttpBackend, ReqwestBackend, RetryPolicy};
use crate::services::logger::Logger;
use std::sync::Arc;
use std::time::Duration;

pub struct App {
    pub logger: Logger,
    pub settings: Settings,
    pub registry: Arc<EndpointRegistry>,
    pub credentials: Arc<CredentialHolder>,
    pub dispatcher: Arc<ToolDispatcher>,
    pub adapter: Arc<ProtocolAdapter>,
}

impl App {
    pub fn initialize(settings: Settings) -> Result<Self, ToolError> {
        let backend = Arc::new(ReqwestBackend::new()?);
        let provider = Self::secret_provider(&settings);
        Self::with_parts(settings, backend, provider, Logger::new("webposto"))
    }

    fn secret_provider(settings: &Settings) -> Arc<dyn SecretProvider> {
        match &settings.secret_file {
            Some(path) => Arc::new(FileSecretProvider::new(path.clone())),
            None => Arc::new(EnvSecretProvider),
        }
    }

    /// Wires the services around an explicit HTTP backend and secret provider.
    pub fn with_parts(
        settings: Settings,
        backend: Arc<dyn HttpBackend>,
        provider: Arc<dyn SecretProvider>,
        logger: Logger,
    ) -> Result<Self, ToolError> {
        let registry = Arc::new(EndpointRegistry::load(settings.registry_path.as_deref())?);
        let credentials = Arc::new(CredentialHolder::new(
            logger.clone(),
            provider,
            &settings.secret_id,
        ));
        let client = Arc::new(ErpClient::new(
            logger.clone(),
            backend,
            settings.base_url()?,
            Duration::from_millis(settings.timeout_ms.max(1)),
            RetryPolicy::default().with_max_attempts(settings.max_attempts),
        ));
        let dispatcher = Arc::new(ToolDispatcher::new(
            logger.clone(),
            registry.clone(),
            client,
            credentials.clone(),
            settings.default_company().map(str::to_string),
        ));
        let adapter = Arc::new(ProtocolAdapter::new(logger.clone(), dispatcher.clone()));
        Ok(Self {
            logger,
            settings,
            registry,
            credentials,
            dispatcher,
            adapter,
        })
    }
}
