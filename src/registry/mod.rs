mod model;

pub use model::{
    ArrayStyle, EndpointDefinition, HttpMethod, PaginationSpec, ParamLocation, ParamSpec,
    ParamType,
};

use crate::errors::ToolError;
use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;

const BUILTIN_REGISTRY: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/endpoint_registry.json"));

static REGISTRY_SCHEMA: Lazy<Value> = Lazy::new(|| {
    let scalar = serde_json::json!(["string", "integer", "decimal", "boolean", "date"]);
    serde_json::json!({
        "type": "object",
        "required": ["endpoints"],
        "properties": {
            "endpoints": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["name", "method", "path"],
                    "additionalProperties": false,
                    "properties": {
                        "name": {"type": "string", "pattern": "^[a-z][a-z0-9_]*$"},
                        "description": {"type": "string"},
                        "method": {"enum": ["GET", "POST", "PUT", "DELETE"]},
                        "path": {"type": "string", "pattern": "^/"},
                        "array_style": {"enum": ["repeat", "comma"]},
                        "pagination": {
                            "type": "object",
                            "required": ["limit_param", "cursor_param"],
                            "additionalProperties": false,
                            "properties": {
                                "limit_param": {"type": "string"},
                                "cursor_param": {"type": "string"},
                                "cursor_field": {"type": "string"}
                            }
                        },
                        "params": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["name", "type"],
                                "additionalProperties": false,
                                "properties": {
                                    "name": {"type": "string", "minLength": 1},
                                    "wire": {"type": "string", "minLength": 1},
                                    "type": {"enum": ["string", "integer", "decimal", "boolean", "date", "enum", "array", "object"]},
                                    "items": {"enum": scalar},
                                    "values": {"type": "array", "items": {"type": "string"}},
                                    "required": {"type": "boolean"},
                                    "location": {"enum": ["query", "path", "body"]},
                                    "tenant": {"type": "boolean"},
                                    "prerequisite": {"type": "string"}
                                }
                            }
                        }
                    }
                }
            }
        }
    })
});

#[derive(Deserialize)]
struct RegistryDocument {
    endpoints: Vec<EndpointDefinition>,
}

/// Immutable catalogue of ERP endpoints, loaded once at startup.
#[derive(Debug, Clone)]
pub struct EndpointRegistry {
    endpoints: Vec<EndpointDefinition>,
    index: HashMap<String, usize>,
}

impl EndpointRegistry {
    pub fn builtin() -> Result<Self, ToolError> {
        Self::from_json_str(BUILTIN_REGISTRY)
    }

    pub fn from_path(path: &Path) -> Result<Self, ToolError> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            ToolError::internal(format!(
                "Failed to read endpoint registry {}: {}",
                path.display(),
                err
            ))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn load(path: Option<&Path>) -> Result<Self, ToolError> {
        match path {
            Some(path) => Self::from_path(path),
            None => Self::builtin(),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ToolError> {
        let document: Value = serde_json::from_str(raw).map_err(|err| {
            ToolError::internal(format!("Endpoint registry is not valid JSON: {}", err))
        })?;
        check_schema(&document)?;
        let parsed: RegistryDocument = serde_json::from_value(document).map_err(|err| {
            ToolError::internal(format!("Endpoint registry has an invalid shape: {}", err))
        })?;
        Self::from_endpoints(parsed.endpoints)
    }

    pub fn from_endpoints(endpoints: Vec<EndpointDefinition>) -> Result<Self, ToolError> {
        let problems = integrity_problems(&endpoints);
        if !problems.is_empty() {
            return Err(ToolError::internal("Endpoint registry failed integrity checks")
                .with_details(serde_json::json!({ "problems": problems })));
        }
        let index = endpoints
            .iter()
            .enumerate()
            .map(|(idx, ep)| (ep.name.clone(), idx))
            .collect();
        Ok(Self { endpoints, index })
    }

    pub fn get(&self, name: &str) -> Option<&EndpointDefinition> {
        self.index.get(name).map(|idx| &self.endpoints[*idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &EndpointDefinition> {
        self.endpoints.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.endpoints.iter().map(|ep| ep.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

fn check_schema(document: &Value) -> Result<(), ToolError> {
    let schema = JSONSchema::compile(&REGISTRY_SCHEMA)
        .map_err(|err| ToolError::internal(format!("Registry meta-schema is invalid: {}", err)))?;
    if let Err(errors) = schema.validate(document) {
        let rendered: Vec<String> = errors
            .take(10)
            .map(|err| {
                let path = err.instance_path.to_string();
                let path = if path.is_empty() { "(root)".to_string() } else { path };
                format!("{}: {}", path, err)
            })
            .collect();
        return Err(ToolError::internal("Endpoint registry does not match its schema")
            .with_details(serde_json::json!({ "errors": rendered })));
    }
    Ok(())
}

fn integrity_problems(endpoints: &[EndpointDefinition]) -> Vec<String> {
    let mut problems = Vec::new();
    let names: HashSet<&str> = endpoints.iter().map(|ep| ep.name.as_str()).collect();
    let mut seen = HashSet::new();

    for ep in endpoints {
        if !seen.insert(ep.name.as_str()) {
            problems.push(format!("{}: duplicate endpoint name", ep.name));
        }

        let mut keys = HashSet::new();
        for param in &ep.params {
            let where_ = format!("{}.{}", ep.name, param.name);
            if !keys.insert(param.name.as_str()) {
                problems.push(format!("{}: duplicate parameter key", where_));
            }
            if let Some(alias) = param.alias() {
                if !keys.insert(alias) {
                    problems.push(format!("{}: alias '{}' collides with another key", where_, alias));
                }
            }
            match param.ty {
                ParamType::Enum if param.values.is_empty() => {
                    problems.push(format!("{}: enum without values", where_));
                }
                ParamType::Array if param.items.is_none() => {
                    problems.push(format!("{}: array without items", where_));
                }
                _ => {}
            }
            if (param.ty == ParamType::Object) != (param.location == ParamLocation::Body) {
                problems.push(format!("{}: only object parameters travel in the body", where_));
            }
            if let Some(prereq) = param.prerequisite.as_deref() {
                if !names.contains(prereq) {
                    problems.push(format!("{}: unknown prerequisite '{}'", where_, prereq));
                }
            }
        }

        let placeholders = ep.path_placeholders();
        for placeholder in &placeholders {
            let bound = ep
                .params
                .iter()
                .any(|p| p.location == ParamLocation::Path && p.wire_name() == *placeholder);
            if !bound {
                problems.push(format!("{}: placeholder {{{}}} has no path parameter", ep.name, placeholder));
            }
        }
        for param in ep.params.iter().filter(|p| p.location == ParamLocation::Path) {
            if !placeholders.contains(&param.wire_name()) {
                problems.push(format!("{}.{}: path parameter missing from path", ep.name, param.name));
            }
            if !param.required {
                problems.push(format!("{}.{}: path parameters must be required", ep.name, param.name));
            }
        }

        if let Some(pagination) = &ep.pagination {
            for key in [&pagination.limit_param, &pagination.cursor_param] {
                if ep.param(key).is_none() {
                    problems.push(format!("{}: pagination parameter '{}' is not declared", ep.name, key));
                }
            }
        }
    }
    problems
}
