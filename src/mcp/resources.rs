use crate::errors::{ErrorCode, McpError};
use crate::registry::EndpointRegistry;
use serde_json::{json, Value};
use std::collections::BTreeSet;

pub const TOOLS_URI: &str = "schema://tools";
pub const DEPENDENCIES_URI: &str = "schema://dependencies";

pub fn list_resources() -> Value {
    json!({
        "resources": [
            {
                "uri": TOOLS_URI,
                "name": "Tool catalogue",
                "description": "Every ERP tool with its method, path and required parameters",
                "mimeType": "application/json"
            },
            {
                "uri": DEPENDENCIES_URI,
                "name": "Tool dependencies",
                "description": "Which tool supplies the identifiers another tool expects",
                "mimeType": "application/json"
            }
        ]
    })
}

fn tools_summary(registry: &EndpointRegistry) -> Value {
    let tools: Vec<Value> = registry
        .iter()
        .map(|ep| {
            json!({
                "name": ep.name,
                "method": ep.method.as_str(),
                "path": ep.path,
                "paginated": ep.pagination.is_some(),
                "required": ep.params.iter().filter(|p| p.required).map(|p| p.name.as_str()).collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({ "total": tools.len(), "tools": tools })
}

fn dependency_graph(registry: &EndpointRegistry) -> Value {
    let mut sources = BTreeSet::new();
    let edges: Vec<Value> = registry
        .iter()
        .flat_map(|ep| {
            ep.prerequisites()
                .map(|(spec, source)| {
                    json!({"tool": ep.name, "parameter": spec.name, "source_tool": source})
                })
                .collect::<Vec<_>>()
        })
        .collect();
    for edge in &edges {
        if let Some(source) = edge["source_tool"].as_str() {
            sources.insert(source.to_string());
        }
    }
    json!({ "sources": sources, "edges": edges })
}

pub fn read_resource(registry: &EndpointRegistry, uri: &str) -> Result<Value, McpError> {
    let content = match uri {
        TOOLS_URI => tools_summary(registry),
        DEPENDENCIES_URI => dependency_graph(registry),
        other => {
            return Err(McpError::new(
                ErrorCode::InvalidParams,
                format!("Unknown resource: {}", other),
            ))
        }
    };
    let text = serde_json::to_string_pretty(&content)
        .map_err(|err| McpError::new(ErrorCode::InternalError, err.to_string()))?;
    Ok(json!({
        "contents": [{ "uri": uri, "mimeType": "application/json", "text": text }]
    }))
}
