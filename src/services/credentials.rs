use crate::constants::secrets::FINGERPRINT_HEX_LEN;
use crate::errors::ToolError;
use crate::services::logger::Logger;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// ERP API key. Debug output never shows the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Arc<str>);

impl Credential {
    pub fn new(value: impl AsRef<str>) -> Result<Self, ToolError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ToolError::credential_unavailable("API key is empty"));
        }
        Ok(Self(Arc::from(trimmed)))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        let mut out = hex::encode(digest);
        out.truncate(FINGERPRINT_HEX_LEN);
        out
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(sha256:{})", self.fingerprint())
    }
}

#[async_trait]
pub trait SecretProvider: Send + Sync {
    async fn fetch(&self, secret_id: &str) -> Result<Credential, ToolError>;
}

pub struct EnvSecretProvider;

#[async_trait]
impl SecretProvider for EnvSecretProvider {
    async fn fetch(&self, secret_id: &str) -> Result<Credential, ToolError> {
        let raw = std::env::var(secret_id).map_err(|_| {
            ToolError::credential_unavailable(format!("{} is not set", secret_id))
                .with_hint("Export the ERP API key or point WEBPOSTO_API_KEY_FILE at a secret file.")
        })?;
        Credential::new(raw)
    }
}

pub struct FileSecretProvider {
    path: PathBuf,
}

impl FileSecretProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SecretProvider for FileSecretProvider {
    async fn fetch(&self, _secret_id: &str) -> Result<Credential, ToolError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|err| {
            ToolError::credential_unavailable(format!(
                "Failed to read API key from {}: {}",
                self.path.display(),
                err
            ))
        })?;
        Credential::new(raw)
    }
}

pub struct StaticSecretProvider(Credential);

impl StaticSecretProvider {
    pub fn new(credential: Credential) -> Self {
        Self(credential)
    }
}

#[async_trait]
impl SecretProvider for StaticSecretProvider {
    async fn fetch(&self, _secret_id: &str) -> Result<Credential, ToolError> {
        Ok(self.0.clone())
    }
}

/// Process-wide cache of the current credential, filled on first use.
pub struct CredentialHolder {
    logger: Logger,
    provider: Arc<dyn SecretProvider>,
    secret_id: String,
    current: RwLock<Option<Credential>>,
}

impl CredentialHolder {
    pub fn new(logger: Logger, provider: Arc<dyn SecretProvider>, secret_id: &str) -> Self {
        Self {
            logger: logger.child("credentials"),
            provider,
            secret_id: secret_id.to_string(),
            current: RwLock::new(None),
        }
    }

    pub async fn get(&self) -> Result<Credential, ToolError> {
        if let Some(existing) = self.current.read().await.as_ref() {
            return Ok(existing.clone());
        }
        let mut slot = self.current.write().await;
        // Another task may have filled the slot while we waited for the write lock.
        if let Some(existing) = slot.as_ref() {
            return Ok(existing.clone());
        }
        let fetched = self.fetch().await?;
        *slot = Some(fetched.clone());
        Ok(fetched)
    }

    pub async fn set(&self, credential: Credential) {
        self.logger.info(
            "Credential replaced",
            Some(&serde_json::json!({"fingerprint": credential.fingerprint()})),
        );
        *self.current.write().await = Some(credential);
    }

    pub async fn refresh(&self) -> Result<Credential, ToolError> {
        let fetched = self.fetch().await?;
        self.set(fetched.clone()).await;
        Ok(fetched)
    }

    pub async fn invalidate(&self) {
        if self.current.write().await.take().is_some() {
            self.logger.warn("Credential invalidated", None);
        }
    }

    async fn fetch(&self) -> Result<Credential, ToolError> {
        match self.provider.fetch(&self.secret_id).await {
            Ok(credential) => {
                self.logger.debug(
                    "Credential loaded",
                    Some(&serde_json::json!({"fingerprint": credential.fingerprint()})),
                );
                Ok(credential)
            }
            Err(err) => {
                self.logger.error(
                    "Credential fetch failed",
                    Some(&serde_json::json!({"secret_id": self.secret_id, "error": err.message})),
                );
                Err(ToolError::credential_unavailable(err.message).with_hint(
                    err.hint
                        .unwrap_or_else(|| "The next call will retry the secret provider.".to_string()),
                ))
            }
        }
    }
}
