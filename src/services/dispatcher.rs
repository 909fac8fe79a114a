use crate::constants::limits::MAX_SUGGESTIONS;
use crate::errors::{ToolError, ToolErrorKind};
use crate::registry::{EndpointDefinition, EndpointRegistry, ParamType};
use crate::services::advisor::{self, Advisory};
use crate::services::credentials::CredentialHolder;
use crate::services::erp_client::ErpClient;
use crate::services::logger::Logger;
use crate::services::pagination::{self, PageInfo};
use crate::services::validation::Validation;
use crate::utils::suggest::suggest;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub kind: &'static str,
    pub category: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub retryable: bool,
}

impl From<ToolError> for ErrorInfo {
    fn from(err: ToolError) -> Self {
        let detail = |key: &str| err.details.as_ref().and_then(|d| d.get(key)).cloned();
        let allowed = detail("allowed");
        let suggestions = detail("suggestions").filter(|v| v.as_array().map_or(false, |a| !a.is_empty()));
        let upstream_body = detail("upstream_body");
        Self {
            kind: err.kind.name(),
            category: err.category,
            message: err.message,
            parameter: err.parameter,
            allowed,
            suggestions,
            status: err.status,
            upstream_body,
            hint: err.hint,
            retryable: err.retryable,
        }
    }
}

/// Uniform result of one tool call.
#[derive(Debug, Clone, Serialize)]
pub struct ResultEnvelope {
    pub success: bool,
    pub tool: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    pub advisories: Vec<Advisory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PageInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub duration_ms: u64,
}

impl ResultEnvelope {
    pub fn error_kind(&self) -> Option<&'static str> {
        self.error.as_ref().map(|e| e.kind)
    }
}

struct Outcome {
    payload: Value,
    pagination: Option<PageInfo>,
}

pub struct ToolDispatcher {
    logger: Logger,
    registry: Arc<EndpointRegistry>,
    validation: Validation,
    client: Arc<ErpClient>,
    credentials: Arc<CredentialHolder>,
    default_company: Option<String>,
}

impl ToolDispatcher {
    pub fn new(
        logger: Logger,
        registry: Arc<EndpointRegistry>,
        client: Arc<ErpClient>,
        credentials: Arc<CredentialHolder>,
        default_company: Option<String>,
    ) -> Self {
        Self {
            logger: logger.child("dispatch"),
            registry,
            validation: Validation::new(),
            client,
            credentials,
            default_company,
        }
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub async fn dispatch(&self, call: ToolCall) -> ResultEnvelope {
        let started = Instant::now();
        let trace_id = uuid::Uuid::new_v4().to_string();
        let mut advisories = Vec::new();
        let outcome = self.run(&call, &mut advisories).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let envelope = match outcome {
            Ok(outcome) => ResultEnvelope {
                success: true,
                tool: call.name,
                trace_id,
                payload: Some(outcome.payload),
                advisories,
                pagination: outcome.pagination,
                error: None,
                duration_ms,
            },
            Err(err) => ResultEnvelope {
                success: false,
                tool: call.name,
                trace_id,
                payload: None,
                advisories,
                pagination: None,
                error: Some(ErrorInfo::from(err)),
                duration_ms,
            },
        };
        self.logger.info(
            "Tool call finished",
            Some(&serde_json::json!({
                "tool": envelope.tool,
                "trace_id": envelope.trace_id,
                "success": envelope.success,
                "error": envelope.error_kind(),
                "advisories": envelope.advisories.len(),
                "duration_ms": duration_ms,
            })),
        );
        envelope
    }

    async fn run(
        &self,
        call: &ToolCall,
        advisories: &mut Vec<Advisory>,
    ) -> Result<Outcome, ToolError> {
        let endpoint = self.resolve(&call.name)?;

        let mut args = call.arguments.clone();
        if let Some(advisory) = self.apply_default_tenant(endpoint, &mut args) {
            advisories.push(advisory);
        }

        let query = self.validation.validate(endpoint, &args)?;
        advisories.extend(advisor::check(endpoint, &query));

        let (query, continuation) = match pagination::first_page(endpoint, query.clone()) {
            Some((first, state)) => (first, Some(state)),
            None => (query, None),
        };

        let credential = self.credentials.get().await?;
        let response = match self.client.execute(endpoint, &query, &credential).await {
            Err(err)
                if err.kind == ToolErrorKind::UpstreamRejected
                    && matches!(err.status, Some(401) | Some(403)) =>
            {
                self.credentials.invalidate().await;
                return Err(err.with_hint(
                    "The ERP refused the API key; it will be reloaded on the next call.",
                ));
            }
            other => other?,
        };

        let pagination = continuation.map(|state| {
            let records = pagination::extract_records(&response.payload).unwrap_or(&[]);
            pagination::observe(state, records).page_info()
        });
        Ok(Outcome {
            payload: response.payload,
            pagination,
        })
    }

    fn resolve(&self, name: &str) -> Result<&EndpointDefinition, ToolError> {
        if let Some(endpoint) = self.registry.get(name) {
            return Ok(endpoint);
        }
        let suggestions = suggest(name, &self.registry.names(), MAX_SUGGESTIONS);
        let mut err = ToolError::unknown_tool(name)
            .with_details(serde_json::json!({ "suggestions": suggestions }));
        if !suggestions.is_empty() {
            err = err.with_hint(format!("Did you mean: {}?", suggestions.join(", ")));
        }
        Err(err)
    }

    fn apply_default_tenant(
        &self,
        endpoint: &EndpointDefinition,
        args: &mut Map<String, Value>,
    ) -> Option<Advisory> {
        let company = self.default_company.as_deref()?;
        let spec = endpoint.tenant_param()?;
        let supplied = [Some(spec.name.as_str()), spec.alias()]
            .into_iter()
            .flatten()
            .any(|key| args.get(key).map_or(false, |v| !v.is_null()));
        if supplied {
            return None;
        }
        let value = if spec.ty == ParamType::Array {
            Value::Array(vec![Value::String(company.to_string())])
        } else {
            Value::String(company.to_string())
        };
        args.insert(spec.name.clone(), value);
        Some(Advisory::default_tenant(&spec.name, company))
    }
}
