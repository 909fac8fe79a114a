use crate::constants::{network, retry, secrets};
use crate::errors::ToolError;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "webposto-mcp", version, about = "MCP server for the WebPosto ERP API")]
pub struct Settings {
    /// ERP base URL
    #[arg(long, env = "WEBPOSTO_URL", default_value = network::DEFAULT_BASE_URL)]
    pub base_url: String,
    /// Company code injected when a tool's tenant parameter is omitted
    #[arg(long, env = "WEBPOSTO_EMPRESA_CODIGO")]
    pub default_company: Option<String>,
    /// Identifier handed to the secret provider (env var name for the env provider)
    #[arg(long, env = "WEBPOSTO_SECRET_ID", default_value = secrets::DEFAULT_SECRET_ID)]
    pub secret_id: String,
    /// Read the API key from a mounted file instead of the environment
    #[arg(long, env = "WEBPOSTO_API_KEY_FILE")]
    pub secret_file: Option<PathBuf>,
    /// Replace the built-in endpoint registry
    #[arg(long = "registry", env = "WEBPOSTO_REGISTRY_PATH")]
    pub registry_path: Option<PathBuf>,
    #[arg(long, env = "WEBPOSTO_TIMEOUT_MS", default_value_t = network::TIMEOUT_API_REQUEST_MS)]
    pub timeout_ms: u64,
    #[arg(long, env = "WEBPOSTO_MAX_ATTEMPTS", default_value_t = retry::MAX_ATTEMPTS)]
    pub max_attempts: usize,
}

impl Settings {
    /// Environment-only parse, for embedding hosts that own argv.
    pub fn from_env() -> Result<Self, ToolError> {
        Self::try_parse_from(["webposto-mcp"])
            .map_err(|err| ToolError::internal(format!("Invalid configuration: {}", err)))
    }

    pub fn base_url(&self) -> Result<url::Url, ToolError> {
        let trimmed = self.base_url.trim().trim_end_matches('/');
        url::Url::parse(trimmed).map_err(|err| {
            ToolError::internal(format!("Invalid WEBPOSTO_URL '{}': {}", trimmed, err))
        })
    }

    pub fn default_company(&self) -> Option<&str> {
        self.default_company
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}
