use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValidationRule {
    MissingRequired,
    UnknownParameter,
    TypeMismatch,
    MalformedDate,
    InvalidEnumValue,
    ShapeMismatch,
}

impl ValidationRule {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationRule::MissingRequired => "MissingRequired",
            ValidationRule::UnknownParameter => "UnknownParameter",
            ValidationRule::TypeMismatch => "TypeMismatch",
            ValidationRule::MalformedDate => "MalformedDate",
            ValidationRule::InvalidEnumValue => "InvalidEnumValue",
            ValidationRule::ShapeMismatch => "ShapeMismatch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorKind {
    UnknownTool,
    Validation(ValidationRule),
    CredentialUnavailable,
    TransportFailure,
    UpstreamRejected,
    Internal,
}

impl ToolErrorKind {
    /// Most specific name, e.g. `MalformedDate` for a date validation failure.
    pub fn name(self) -> &'static str {
        match self {
            ToolErrorKind::UnknownTool => "UnknownTool",
            ToolErrorKind::Validation(rule) => rule.as_str(),
            ToolErrorKind::CredentialUnavailable => "CredentialUnavailable",
            ToolErrorKind::TransportFailure => "TransportFailure",
            ToolErrorKind::UpstreamRejected => "UpstreamRejected",
            ToolErrorKind::Internal => "Internal",
        }
    }

    pub fn category(self) -> &'static str {
        match self {
            ToolErrorKind::Validation(_) => "ValidationFailure",
            other => other.name(),
        }
    }
}

impl Serialize for ToolErrorKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub category: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub retryable: bool,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            category: kind.category(),
            message: message.into(),
            parameter: None,
            status: None,
            hint: None,
            details: None,
            retryable: matches!(
                kind,
                ToolErrorKind::TransportFailure | ToolErrorKind::CredentialUnavailable
            ),
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = Some(parameter.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn unknown_tool(name: &str) -> Self {
        Self::new(ToolErrorKind::UnknownTool, format!("Unknown tool: {}", name))
    }

    pub fn validation(rule: ValidationRule, parameter: &str, message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Validation(rule), message).with_parameter(parameter)
    }

    pub fn credential_unavailable(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::CredentialUnavailable, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::TransportFailure, message)
    }

    pub fn upstream_rejected(status: u16, body: Value) -> Self {
        Self::new(
            ToolErrorKind::UpstreamRejected,
            format!("ERP rejected the request with HTTP {}", status),
        )
        .with_status(status)
        .with_details(serde_json::json!({ "upstream_body": body }))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Internal, message)
    }

    pub fn rule(&self) -> Option<ValidationRule> {
        match self.kind {
            ToolErrorKind::Validation(rule) => Some(rule),
            _ => None,
        }
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ToolError {}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        ToolError::internal(err.to_string())
    }
}
