use crate::registry::{EndpointDefinition, EndpointRegistry, ParamLocation, ParamSpec, ParamType};
use serde::Serialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Serialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

fn type_schema(ty: ParamType, values: &[String], items: Option<ParamType>) -> Value {
    match ty {
        ParamType::String => json!({"type": "string"}),
        ParamType::Integer => json!({"type": "integer"}),
        ParamType::Decimal => json!({"type": "number"}),
        ParamType::Boolean => json!({"type": "boolean"}),
        ParamType::Date => json!({
            "type": "string",
            "format": "date",
            "pattern": r"^\d{4}-\d{2}-\d{2}$"
        }),
        ParamType::Enum => json!({"type": "string", "enum": values}),
        ParamType::Array => json!({
            "type": "array",
            "items": type_schema(items.unwrap_or(ParamType::String), &[], None)
        }),
        ParamType::Object => json!({"type": "object"}),
    }
}

fn param_description(spec: &ParamSpec) -> String {
    let mut parts = Vec::new();
    if let Some(alias) = spec.alias() {
        parts.push(format!("ERP field {}.", alias));
    }
    match spec.ty {
        ParamType::Date => parts.push("Date as YYYY-MM-DD.".to_string()),
        ParamType::Array => parts.push("List of values.".to_string()),
        _ => {}
    }
    if spec.location == ParamLocation::Body {
        parts.push("JSON request body.".to_string());
    }
    if spec.tenant {
        parts.push("Company code.".to_string());
    }
    if let Some(prereq) = spec.prerequisite.as_deref() {
        parts.push(format!("Take it from {}.", prereq));
    }
    parts.join(" ")
}

pub fn input_schema(endpoint: &EndpointDefinition) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for spec in &endpoint.params {
        let mut schema = type_schema(spec.ty, &spec.values, spec.items);
        let description = param_description(spec);
        if let (Some(obj), false) = (schema.as_object_mut(), description.is_empty()) {
            obj.insert("description".to_string(), Value::String(description));
        }
        if spec.required {
            required.push(spec.name.clone());
        }
        properties.insert(spec.name.clone(), schema);
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

pub fn tool_definition(endpoint: &EndpointDefinition) -> ToolDef {
    let mut description = endpoint.description.clone();
    if let Some(pagination) = &endpoint.pagination {
        description.push_str(&format!(
            " Paginated: {} sets the page size (default 100, max 2000); pass pagination.next_cursor back as {} for the next page.",
            pagination.limit_param, pagination.cursor_param
        ));
    }
    ToolDef {
        name: endpoint.name.clone(),
        description,
        input_schema: input_schema(endpoint),
    }
}

pub fn list_tools(registry: &EndpointRegistry) -> Vec<ToolDef> {
    registry.iter().map(tool_definition).collect()
}
