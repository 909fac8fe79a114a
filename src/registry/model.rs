use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub fn is_read(self) -> bool {
        matches!(self, HttpMethod::Get)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Decimal,
    Boolean,
    Date,
    Enum,
    Array,
    Object,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Decimal => "decimal",
            ParamType::Boolean => "boolean",
            ParamType::Date => "date",
            ParamType::Enum => "enum",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    #[default]
    Query,
    Path,
    Body,
}

/// How array values are laid out in the query string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayStyle {
    /// `?filial=1&filial=2`
    #[default]
    Repeat,
    /// `?pedidos=1,2`
    Comma,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wire: Option<String>,
    #[serde(rename = "type")]
    pub ty: ParamType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ParamType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub location: ParamLocation,
    #[serde(default)]
    pub tenant: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prerequisite: Option<String>,
}

impl ParamSpec {
    pub fn wire_name(&self) -> &str {
        self.wire.as_deref().unwrap_or(&self.name)
    }

    pub fn alias(&self) -> Option<&str> {
        self.wire.as_deref().filter(|wire| *wire != self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationSpec {
    pub limit_param: String,
    pub cursor_param: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_field: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub method: HttpMethod,
    pub path: String,
    #[serde(default)]
    pub array_style: ArrayStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationSpec>,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
}

impl EndpointDefinition {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Looks a parameter up by its argument name or its wire alias.
    pub fn param_by_key(&self, key: &str) -> Option<&ParamSpec> {
        self.params
            .iter()
            .find(|p| p.name == key || p.alias() == Some(key))
    }

    pub fn tenant_param(&self) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.tenant)
    }

    pub fn prerequisites(&self) -> impl Iterator<Item = (&ParamSpec, &str)> {
        self.params
            .iter()
            .filter_map(|p| p.prerequisite.as_deref().map(|tool| (p, tool)))
    }

    pub fn path_placeholders(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut rest = self.path.as_str();
        while let Some(start) = rest.find('{') {
            let after = &rest[start + 1..];
            let Some(end) = after.find('}') else {
                break;
            };
            out.push(&after[..end]);
            rest = &after[end + 1..];
        }
        out
    }
}
